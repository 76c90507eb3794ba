//! k-nearest-neighbour beat classifier
//!
//! A beat is described by two features: its amplitude and the RR interval
//! (time since the previous peak, in milliseconds). The paired client
//! uploads a labelled [`TrainingSet`] of 40 points; each detected beat is
//! classified against it.
//!
//! ## Voting
//!
//! The K nearest neighbours vote with rank-squared weights: the neighbour at
//! rank position `r` (0 = nearest) contributes `(K - r)²` to its label.
//! Neighbours at exactly the same distance share the rank of the first of
//! their group, so equidistant points carry equal weight. A label wins only
//! with a strict majority over both other labels; otherwise the beat is
//! [`Label::Unknown`].

use crate::types::Label;

/// Number of normal-beat points in a training set.
pub const NORMAL_POINTS: usize = 20;
/// Number of atrial-beat points in a training set.
pub const ATRIAL_POINTS: usize = 10;
/// Number of ventricular-beat points in a training set.
pub const VENTRICULAR_POINTS: usize = 10;
/// Total training points across all classes.
pub const TRAINING_POINTS: usize = NORMAL_POINTS + ATRIAL_POINTS + VENTRICULAR_POINTS;

/// Default neighbour count.
pub const DEFAULT_K: usize = 4;

/// One labelled training observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainingPoint {
    /// RR interval in milliseconds.
    pub period: u16,
    pub amplitude: u16,
}

impl TrainingPoint {
    pub const fn new(amplitude: u16, period: u16) -> Self {
        Self { period, amplitude }
    }
}

/// The complete labelled training set, replaced wholesale by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainingSet {
    pub normal: [TrainingPoint; NORMAL_POINTS],
    pub atrial: [TrainingPoint; ATRIAL_POINTS],
    pub ventricular: [TrainingPoint; VENTRICULAR_POINTS],
}

impl TrainingSet {
    /// Iterate over every point with its label, normal first.
    pub fn points(&self) -> impl Iterator<Item = (Label, TrainingPoint)> + '_ {
        let normal = self.normal.iter().map(|p| (Label::Normal, *p));
        let atrial = self.atrial.iter().map(|p| (Label::Atrial, *p));
        let ventricular = self.ventricular.iter().map(|p| (Label::Ventricular, *p));
        normal.chain(atrial).chain(ventricular)
    }
}

/// A training point annotated with its distance to a query.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Neighbor {
    pub amplitude: u16,
    pub rr_interval: u16,
    pub label: Label,
    pub distance: f64,
}

/// k-NN classifier with rank-squared voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    k: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl Classifier {
    /// Create a classifier voting over the `k` nearest points.
    pub fn new(k: usize) -> Self {
        Self { k: k.min(TRAINING_POINTS) }
    }

    /// Neighbour count actually used.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Every training point sorted by ascending distance to the query.
    pub fn neighbors(
        &self,
        set: &TrainingSet,
        amplitude: u16,
        rr_interval: u16,
    ) -> [Neighbor; TRAINING_POINTS] {
        let mut neighbors = [Neighbor::default(); TRAINING_POINTS];
        for (slot, (label, point)) in neighbors.iter_mut().zip(set.points()) {
            *slot = Neighbor {
                amplitude: point.amplitude,
                rr_interval: point.period,
                label,
                distance: distance(amplitude, rr_interval, point.amplitude, point.period),
            };
        }
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors
    }

    /// Classify a beat.
    pub fn classify(&self, set: &TrainingSet, amplitude: u16, rr_interval: u16) -> Label {
        let neighbors = self.neighbors(set, amplitude, rr_interval);
        let nearest = &neighbors[..self.k];

        // Indexed by label byte
        let mut weights = [0u32; 4];
        let mut rank = 0;
        for (position, neighbor) in nearest.iter().enumerate() {
            if position > 0 && neighbor.distance != nearest[position - 1].distance {
                rank = position;
            }
            let weight = (self.k - rank) as u32;
            weights[neighbor.label.as_byte() as usize] += weight * weight;
        }

        let [_, n, a, v] = weights;
        if n > a && n > v {
            Label::Normal
        } else if a > n && a > v {
            Label::Atrial
        } else if v > n && v > a {
            Label::Ventricular
        } else {
            Label::Unknown
        }
    }
}

fn distance(amplitude_1: u16, period_1: u16, amplitude_2: u16, period_2: u16) -> f64 {
    let da = f64::from(amplitude_1) - f64::from(amplitude_2);
    let dp = f64::from(period_1) - f64::from(period_2);
    (da * da + dp * dp).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAR: TrainingPoint = TrainingPoint { period: 60_000, amplitude: 60_000 };

    fn far_set() -> TrainingSet {
        TrainingSet {
            normal: [FAR; NORMAL_POINTS],
            atrial: [FAR; ATRIAL_POINTS],
            ventricular: [FAR; VENTRICULAR_POINTS],
        }
    }

    fn clustered_set() -> TrainingSet {
        let mut set = far_set();
        for (i, p) in set.normal.iter_mut().enumerate() {
            let jitter = (i as u16 % 5) * 3;
            *p = TrainingPoint::new(495 + jitter, 795 + jitter);
        }
        for (i, p) in set.atrial.iter_mut().enumerate() {
            *p = TrainingPoint::new(2000 + i as u16, 300 + i as u16);
        }
        for (i, p) in set.ventricular.iter_mut().enumerate() {
            *p = TrainingPoint::new(3000 + i as u16, 1500 + i as u16);
        }
        set
    }

    #[test]
    fn query_inside_normal_cluster_is_normal() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(&clustered_set(), 505, 805), Label::Normal);
    }

    #[test]
    fn query_near_other_clusters() {
        let classifier = Classifier::default();
        let set = clustered_set();
        assert_eq!(classifier.classify(&set, 2003, 302), Label::Atrial);
        assert_eq!(classifier.classify(&set, 3004, 1498), Label::Ventricular);
    }

    #[test]
    fn equidistant_tie_between_two_labels_is_unknown() {
        let mut set = far_set();
        set.normal[0] = TrainingPoint::new(1003, 1004);
        set.normal[1] = TrainingPoint::new(997, 996);
        set.atrial[0] = TrainingPoint::new(1004, 1003);
        set.atrial[1] = TrainingPoint::new(996, 997);

        let classifier = Classifier::new(4);
        assert_eq!(classifier.classify(&set, 1000, 1000), Label::Unknown);
    }

    #[test]
    fn nearer_neighbours_outweigh_a_count_majority() {
        let mut set = far_set();
        set.atrial[0] = TrainingPoint::new(1000, 1000);
        set.normal[0] = TrainingPoint::new(1010, 1000);
        set.normal[1] = TrainingPoint::new(1020, 1000);
        set.normal[2] = TrainingPoint::new(1030, 1000);

        // Atrial: 4² = 16, Normal: 3² + 2² + 1² = 14
        let classifier = Classifier::new(4);
        assert_eq!(classifier.classify(&set, 1000, 1000), Label::Atrial);
    }

    #[test]
    fn neighbours_are_sorted_and_labelled() {
        let set = clustered_set();
        let neighbors = Classifier::default().neighbors(&set, 505, 805);
        assert!(neighbors.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(neighbors[0].label, Label::Normal);
        assert_eq!(neighbors.iter().filter(|n| n.label == Label::Atrial).count(), ATRIAL_POINTS);
    }

    #[test]
    fn equal_distances_keep_training_order() {
        let mut set = far_set();
        set.ventricular[0] = TrainingPoint::new(1000, 1000);
        let neighbors = Classifier::default().neighbors(&set, 1000, 1000);

        assert_eq!(neighbors[0].label, Label::Ventricular);
        let labels: Vec<Label> = neighbors[1..].iter().map(|n| n.label).collect();
        let mut expected: Vec<Label> = set.points().map(|(label, _)| label).collect();
        expected.remove(NORMAL_POINTS + ATRIAL_POINTS);
        assert_eq!(labels, expected);
    }

    #[test]
    fn k_is_clamped_to_training_size() {
        assert_eq!(Classifier::new(500).k(), TRAINING_POINTS);
        assert_eq!(Classifier::new(0).classify(&clustered_set(), 505, 805), Label::Unknown);
    }

    #[test]
    fn training_points_iterate_in_class_order() {
        let set = clustered_set();
        let labels: Vec<Label> = set.points().map(|(label, _)| label).collect();
        assert_eq!(labels.len(), TRAINING_POINTS);
        assert_eq!(labels[0], Label::Normal);
        assert_eq!(labels[NORMAL_POINTS], Label::Atrial);
        assert_eq!(labels[NORMAL_POINTS + ATRIAL_POINTS], Label::Ventricular);
    }
}
