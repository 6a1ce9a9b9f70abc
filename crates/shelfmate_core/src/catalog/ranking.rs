//! Popularity ranking of search results.
//!
//! Results with ratings always come before results without any. Rated results are ordered by
//! `average² × count + count × 2`, which rewards high averages quadratically while the linear
//! count term keeps a handful of perfect ratings from beating a large body of good ones. When
//! two scores are within `CLOSE_SCORE_MARGIN` of each other, the result with more ratings wins.
use core::cmp::Ordering;

/// Scores closer than this are considered equal, and ordered by rating count instead.
pub const CLOSE_SCORE_MARGIN: f64 = 5.0;

/// Anything that carries an average rating and a number of ratings.
pub trait Popularity {
    fn average_rating(&self) -> f64;
    fn ratings_count(&self) -> u64;
}

#[must_use]
#[inline]
#[allow(
    clippy::cast_precision_loss,
    clippy::as_conversions,
    reason = "Rating counts are far below 2^52"
)]
pub fn popularity_score(average_rating: f64, ratings_count: u64) -> f64 {
    let count = ratings_count as f64;
    average_rating.powi(2) * count + count * 2.0
}

fn is_rated<T: Popularity>(item: &T) -> bool {
    item.ratings_count() > 0 && item.average_rating() > 0.0
}

/// Compares two items, the more popular one being `Less`.
#[must_use]
#[inline]
pub fn compare_popularity<T: Popularity>(first: &T, second: &T) -> Ordering {
    match (is_rated(first), is_rated(second)) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => {
            let first_score = popularity_score(first.average_rating(), first.ratings_count());
            let second_score = popularity_score(second.average_rating(), second.ratings_count());
            if (first_score - second_score).abs() < CLOSE_SCORE_MARGIN {
                second.ratings_count().cmp(&first.ratings_count())
            } else {
                second_score
                    .partial_cmp(&first_score)
                    .unwrap_or(Ordering::Equal)
            }
        }
    }
}

/// Sorts items from most to least popular. Items the comparison considers equal keep their
/// relative order.
///
/// The close-score rule makes the comparison intransitive, which `slice::sort_by` is allowed to
/// answer with a panic. A stable insertion sort only ever swaps neighbours that compare
/// `Greater`, and search result lists are a few dozen items long.
#[allow(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "Indices stay within 1..len"
)]
#[inline]
pub fn rank_by_popularity<T: Popularity>(items: &mut [T]) {
    for unsorted in 1..items.len() {
        let mut position = unsorted;
        while position > 0
            && compare_popularity(&items[position - 1], &items[position]) == Ordering::Greater
        {
            items.swap(position - 1, position);
            position -= 1;
        }
    }
}
