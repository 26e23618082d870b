//! # Collection Store
//!
//! In-memory view of the user's favorites, watchlist and ratings for this session.
//!
//! ## Requirements
//!
//! - Synchronous, never touches the network or disk
//! - One entry per movie per collection
//! - Insertion order kept for display stability, including across a revert
//!
//! ## Snapshots
//!
//! Two granularities:
//! - [`Snapshot`]: a whole collection, used for persistence and hydration
//! - [`EntrySnapshot`]: one movie's prior state and position, used to revert a single mutation
//!   without disturbing other movies that are mid-flight in the same collection
use parking_lot::RwLock;
use tracing::debug;

use crate::model::{
    CollectionItem, CollectionKind, Hydrated, MovieId, Operation, RatedMovie, RatingValue,
};

pub type Members = Ordered<CollectionItem>;
pub type Ratings = Ordered<RatingValue>;

/// Values keyed by movie id, in insertion order.
///
/// A user's collections are small, so lookups scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordered<V> {
    entries: Vec<(MovieId, V)>,
}

impl<V> Default for Ordered<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V: Copy> Ordered<V> {
    fn position(&self, movie_id: MovieId) -> Option<usize> {
        self.entries.iter().position(|&(id, _)| id == movie_id)
    }

    pub fn get(&self, movie_id: MovieId) -> Option<V> {
        self.get_full(movie_id).map(|(_, value)| value)
    }

    pub fn get_full(&self, movie_id: MovieId) -> Option<(usize, V)> {
        self.position(movie_id)
            .map(|index| (index, self.entries[index].1))
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.position(movie_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MovieId, V)> + '_ {
        self.entries.iter().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = V> + '_ {
        self.entries.iter().map(|&(_, value)| value)
    }

    /// Overwrites in place, or appends a new movie at the end.
    fn insert(&mut self, movie_id: MovieId, value: V) -> Option<V> {
        match self.position(movie_id) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((movie_id, value));
                None
            }
        }
    }

    fn remove(&mut self, movie_id: MovieId) -> Option<V> {
        self.position(movie_id)
            .map(|index| self.entries.remove(index).1)
    }

    /// Places the movie at `index`, or at the end if the list has since shrunk.
    fn put_at(&mut self, index: usize, movie_id: MovieId, value: V) {
        self.remove(movie_id);

        let target = index.min(self.entries.len());
        self.entries.insert(target, (movie_id, value));
    }
}

impl<V: Copy> FromIterator<(MovieId, V)> for Ordered<V> {
    fn from_iter<I: IntoIterator<Item = (MovieId, V)>>(iter: I) -> Self {
        let mut ordered = Self::default();
        for (movie_id, value) in iter {
            ordered.insert(movie_id, value);
        }

        ordered
    }
}

#[derive(Debug, Default)]
struct Collections {
    favorites: Members,
    watchlist: Members,
    ratings: Ratings,
    // bumped whenever the whole store is replaced
    generation: u64,
}

impl Collections {
    fn members(&self, kind: CollectionKind) -> Option<&Members> {
        match kind {
            CollectionKind::Favorite => Some(&self.favorites),
            CollectionKind::Watchlist => Some(&self.watchlist),
            CollectionKind::Rating => None,
        }
    }

    fn members_mut(&mut self, kind: CollectionKind) -> Option<&mut Members> {
        match kind {
            CollectionKind::Favorite => Some(&mut self.favorites),
            CollectionKind::Watchlist => Some(&mut self.watchlist),
            CollectionKind::Rating => None,
        }
    }
}

/// A whole collection, copied out of the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Favorite(Members),
    Watchlist(Members),
    Rating(Ratings),
}

impl Snapshot {
    pub fn kind(&self) -> CollectionKind {
        match self {
            Self::Favorite(_) => CollectionKind::Favorite,
            Self::Watchlist(_) => CollectionKind::Watchlist,
            Self::Rating(_) => CollectionKind::Rating,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Prior {
    Member { index: usize, item: CollectionItem },
    Rated { index: usize, rating: RatingValue },
}

/// One movie's state in one collection, including where it sat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySnapshot {
    kind: CollectionKind,
    movie_id: MovieId,
    prior: Option<Prior>,
    generation: u64,
}

impl EntrySnapshot {
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn movie_id(&self) -> MovieId {
        self.movie_id
    }

    pub fn was_present(&self) -> bool {
        self.prior.is_some()
    }
}

/// What [`CollectionStore::apply`] actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Added,
    Removed,
    Rated { previous: Option<RatingValue> },
    Unchanged,
}

#[derive(Debug, Default)]
pub struct CollectionStore {
    inner: RwLock<Collections>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: CollectionKind, movie_id: MovieId) -> bool {
        let collections = self.inner.read();

        match collections.members(kind) {
            Some(members) => members.contains(movie_id),
            None => collections.ratings.contains(movie_id),
        }
    }

    pub fn rating(&self, movie_id: MovieId) -> Option<RatingValue> {
        self.inner.read().ratings.get(movie_id)
    }

    /// Members of a set collection in insertion order. Empty for ratings.
    pub fn items(&self, kind: CollectionKind) -> Vec<CollectionItem> {
        self.inner
            .read()
            .members(kind)
            .map(|members| members.values().collect())
            .unwrap_or_default()
    }

    pub fn ratings(&self) -> Vec<RatedMovie> {
        self.inner
            .read()
            .ratings
            .iter()
            .map(|(movie_id, rating)| RatedMovie { movie_id, rating })
            .collect()
    }

    pub fn len(&self, kind: CollectionKind) -> usize {
        let collections = self.inner.read();

        match collections.members(kind) {
            Some(members) => members.len(),
            None => collections.ratings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        CollectionKind::ALL.iter().all(|&kind| self.len(kind) == 0)
    }

    pub fn snapshot(&self, kind: CollectionKind) -> Snapshot {
        let collections = self.inner.read();

        match kind {
            CollectionKind::Favorite => Snapshot::Favorite(collections.favorites.clone()),
            CollectionKind::Watchlist => Snapshot::Watchlist(collections.watchlist.clone()),
            CollectionKind::Rating => Snapshot::Rating(collections.ratings.clone()),
        }
    }

    pub fn entry(&self, kind: CollectionKind, movie_id: MovieId) -> EntrySnapshot {
        let collections = self.inner.read();

        let prior = match collections.members(kind) {
            Some(members) => members
                .get_full(movie_id)
                .map(|(index, item)| Prior::Member { index, item }),
            None => collections
                .ratings
                .get_full(movie_id)
                .map(|(index, rating)| Prior::Rated { index, rating }),
        };

        EntrySnapshot {
            kind,
            movie_id,
            prior,
            generation: collections.generation,
        }
    }

    pub fn apply(&self, kind: CollectionKind, movie_id: MovieId, operation: Operation) -> Applied {
        let mut collections = self.inner.write();

        let applied = match collections.members_mut(kind) {
            Some(members) => match operation {
                Operation::Add if members.contains(movie_id) => Applied::Unchanged,
                Operation::Add => {
                    members.insert(movie_id, CollectionItem::now(movie_id));
                    Applied::Added
                }
                Operation::Remove => removed(members.remove(movie_id)),
                Operation::SetRating(_) => Applied::Unchanged,
            },
            None => match operation {
                Operation::SetRating(rating) => Applied::Rated {
                    previous: collections.ratings.insert(movie_id, rating),
                },
                Operation::Remove => removed(collections.ratings.remove(movie_id)),
                Operation::Add => Applied::Unchanged,
            },
        };

        debug!(%kind, movie_id, %operation, ?applied, "Applied to store");
        applied
    }

    /// Replaces a whole collection with the snapshot, verbatim.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut collections = self.inner.write();

        match snapshot {
            Snapshot::Favorite(members) => collections.favorites = members,
            Snapshot::Watchlist(members) => collections.watchlist = members,
            Snapshot::Rating(ratings) => collections.ratings = ratings,
        }
    }

    /// Puts one movie back exactly as it was, at the position it held.
    ///
    /// Skipped if the store was cleared or hydrated since the snapshot was taken.
    pub fn restore_entry(&self, entry: EntrySnapshot) {
        let mut collections = self.inner.write();
        let EntrySnapshot {
            kind,
            movie_id,
            prior,
            generation,
        } = entry;

        if generation != collections.generation {
            debug!(%kind, movie_id, "Store replaced since snapshot, not restoring");
            return;
        }

        let restored = match collections.members_mut(kind) {
            Some(members) => match prior {
                None => {
                    members.remove(movie_id);
                    true
                }
                Some(Prior::Member { index, item }) => {
                    members.put_at(index, movie_id, item);
                    true
                }
                Some(Prior::Rated { .. }) => false,
            },
            None => match prior {
                None => {
                    collections.ratings.remove(movie_id);
                    true
                }
                Some(Prior::Rated { index, rating }) => {
                    collections.ratings.put_at(index, movie_id, rating);
                    true
                }
                Some(Prior::Member { .. }) => false,
            },
        };

        if !restored {
            debug!(%kind, movie_id, "Entry snapshot does not match collection");
            return;
        }

        debug!(%kind, movie_id, "Restored entry");
    }

    pub fn hydrate(&self, hydrated: Hydrated) {
        let mut collections = self.inner.write();
        collections.generation += 1;

        collections.favorites = hydrated
            .favorites
            .into_iter()
            .map(|item| (item.movie_id, item))
            .collect();
        collections.watchlist = hydrated
            .watchlist
            .into_iter()
            .map(|item| (item.movie_id, item))
            .collect();
        collections.ratings = hydrated
            .ratings
            .into_iter()
            .map(|rated| (rated.movie_id, rated.rating))
            .collect();
    }

    pub fn clear(&self) {
        let mut collections = self.inner.write();

        *collections = Collections {
            generation: collections.generation + 1,
            ..Collections::default()
        };
    }
}

fn removed<V>(value: Option<V>) -> Applied {
    match value {
        Some(_) => Applied::Removed,
        None => Applied::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use CollectionKind::{Favorite, Rating, Watchlist};

    fn rating(value: f64) -> RatingValue {
        RatingValue::new(value).unwrap()
    }

    fn ids(store: &CollectionStore, kind: CollectionKind) -> Vec<MovieId> {
        store.items(kind).iter().map(|item| item.movie_id).collect()
    }

    fn seeded() -> CollectionStore {
        let store = CollectionStore::new();
        store.hydrate(Hydrated {
            favorites: [7, 42, 9].into_iter().map(CollectionItem::now).collect(),
            watchlist: vec![CollectionItem::now(3)],
            ratings: vec![
                RatedMovie {
                    movie_id: 5,
                    rating: rating(6.0),
                },
                RatedMovie {
                    movie_id: 8,
                    rating: rating(9.5),
                },
            ],
        });

        store
    }

    #[test]
    fn test_membership_is_not_a_counter() {
        let store = CollectionStore::new();

        assert_eq!(store.apply(Favorite, 42, Operation::Add), Applied::Added);
        assert_eq!(store.apply(Favorite, 42, Operation::Add), Applied::Unchanged);
        assert_eq!(store.len(Favorite), 1);

        assert_eq!(store.apply(Favorite, 42, Operation::Remove), Applied::Removed);
        assert_eq!(store.apply(Favorite, 42, Operation::Remove), Applied::Unchanged);
        assert!(!store.contains(Favorite, 42));
    }

    #[test]
    fn test_collections_are_independent() {
        let store = CollectionStore::new();

        store.apply(Favorite, 42, Operation::Add);

        assert!(store.contains(Favorite, 42));
        assert!(!store.contains(Watchlist, 42));
        assert!(!store.contains(Rating, 42));
    }

    #[test]
    fn test_set_rating_overwrites_in_place() {
        let store = seeded();

        assert_eq!(
            store.apply(Rating, 5, Operation::SetRating(rating(8.0))),
            Applied::Rated {
                previous: Some(rating(6.0))
            }
        );
        assert_eq!(store.rating(5), Some(rating(8.0)));

        let order: Vec<MovieId> = store.ratings().iter().map(|r| r.movie_id).collect();
        assert_eq!(order, vec![5, 8]);
    }

    #[test]
    fn test_mismatched_operations_are_ignored() {
        let store = CollectionStore::new();

        assert_eq!(
            store.apply(Favorite, 1, Operation::SetRating(rating(5.0))),
            Applied::Unchanged
        );
        assert_eq!(store.apply(Rating, 1, Operation::Add), Applied::Unchanged);
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_restore_is_verbatim() {
        let store = seeded();
        let before = store.items(Favorite);
        let snapshot = store.snapshot(Favorite);

        store.apply(Favorite, 42, Operation::Remove);
        store.apply(Favorite, 100, Operation::Add);
        store.restore(snapshot);

        assert_eq!(store.items(Favorite), before);
    }

    #[test]
    fn test_restore_entry_keeps_position() {
        let store = seeded();
        let before = store.items(Favorite);
        let entry = store.entry(Favorite, 42);

        store.apply(Favorite, 42, Operation::Remove);
        assert_eq!(ids(&store, Favorite), vec![7, 9]);

        store.restore_entry(entry);
        assert_eq!(store.items(Favorite), before);
    }

    #[test]
    fn test_restore_entry_of_absent_movie_removes_it() {
        let store = seeded();
        let entry = store.entry(Favorite, 11);
        assert!(!entry.was_present());

        store.apply(Favorite, 11, Operation::Add);
        store.restore_entry(entry);

        assert_eq!(ids(&store, Favorite), vec![7, 42, 9]);
    }

    #[test]
    fn test_restore_entry_leaves_other_movies_alone() {
        let store = seeded();
        let entry = store.entry(Favorite, 42);

        store.apply(Favorite, 42, Operation::Remove);
        store.apply(Favorite, 9, Operation::Remove);
        store.apply(Favorite, 50, Operation::Add);
        store.restore_entry(entry);

        assert_eq!(ids(&store, Favorite), vec![7, 42, 50]);
    }

    #[test]
    fn test_restore_entry_brings_back_previous_rating() {
        let store = seeded();
        let before = store.ratings();
        let entry = store.entry(Rating, 5);

        store.apply(Rating, 5, Operation::Remove);
        assert_eq!(store.rating(5), None);

        store.restore_entry(entry);
        assert_eq!(store.ratings(), before);

        let entry = store.entry(Rating, 8);
        store.apply(Rating, 8, Operation::SetRating(rating(1.0)));
        store.restore_entry(entry);
        assert_eq!(store.ratings(), before);
    }

    #[test]
    fn test_restore_entry_after_clear_is_skipped() {
        let store = seeded();
        let entry = store.entry(Favorite, 42);

        store.apply(Favorite, 42, Operation::Remove);
        store.clear();
        store.restore_entry(entry);

        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let store = seeded();
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
    }
}
