//! Daniel Lemire's streaming min-max algorithm[^1] over uniformly sampled signals, as
//! used for robust monitoring of STL[^2].
//!
//! [^1]: Daniel Lemire. 2007. Streaming Maximum-Minimum Filter Using No More than Three
//! Comparisons per Element. arXiv:cs/0610046.
//!
//! [^2]: Alexandre Donzé, Thomas Ferrère, and Oded Maler. 2013. Efficient Robust
//! Monitoring for STL. In Computer Aided Verification (Lecture Notes in Computer
//! Science), Springer, Berlin, Heidelberg, 264–279.

use std::collections::VecDeque;

/// A monotonic wedge of `(sample index, value)` pairs.
///
/// The front of the wedge is the extremum of every sample pushed since the last purge.
#[derive(Debug, Clone)]
pub struct MonoWedge<T> {
    window: VecDeque<(usize, T)>,
    cmp: fn(&T, &T) -> bool,
}

impl<T> MonoWedge<T> {
    pub fn new(cmp: fn(&T, &T) -> bool) -> Self {
        Self {
            window: Default::default(),
            cmp,
        }
    }
}

impl<T> MonoWedge<T> {
    pub fn update(&mut self, sample: (usize, T)) {
        debug_assert!(
            self.window.back().map_or(true, |v| v.0 < sample.0),
            "MonoWedge window samples don't have monotonic indices"
        );
        // Find the index to partition the inner queue based on the comparison function.
        let cmp_idx = self.window.partition_point(|a| (self.cmp)(&a.1, &sample.1));

        // And delete all items in the second partition.
        let _ = self.window.split_off(cmp_idx);

        self.window.push_back(sample);
    }

    pub fn front(&self) -> Option<(&usize, &T)> {
        self.window.front().map(|(t, v)| (t, v))
    }

    /// Drop every sample with an index smaller than `t`.
    pub fn purge_before(&mut self, t: usize) {
        while let Some(item) = self.window.front() {
            if item.0 < t {
                let _ = self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl<T> MonoWedge<T>
where
    T: PartialOrd,
{
    pub fn min_wedge() -> Self {
        Self::new(T::lt)
    }

    pub fn max_wedge() -> Self {
        Self::new(T::gt)
    }
}

impl<T> MonoWedge<T>
where
    T: Copy,
{
    /// Slide a window of `width + 1` samples over `values`.
    ///
    /// Element `t` of the output is the extremum of `values[t..=t + width]`; windows
    /// that don't fit in `values` produce no output.
    pub fn sliding(mut self, values: &[T], width: usize) -> Vec<T> {
        let mut ret = Vec::with_capacity(values.len().saturating_sub(width));
        for (i, value) in values.iter().enumerate() {
            self.update((i, *value));
            if i >= width {
                self.purge_before(i - width);
                if let Some((_, v)) = self.front() {
                    ret.push(*v);
                }
            }
        }
        ret
    }
}

#[cfg(test)]
mod tests {

    use proptest::prelude::*;

    use super::*;

    fn run_test_min_max<T>(values: Vec<T>, width: usize)
    where
        T: Copy + Clone + core::cmp::PartialOrd + Ord + std::fmt::Debug,
    {
        let len = values.len().saturating_sub(width);
        let expected_mins: Vec<T> = (0..len)
            .map(|i| values[i..=i + width].iter().min().copied().unwrap())
            .collect();
        let expected_maxs: Vec<T> = (0..len)
            .map(|i| values[i..=i + width].iter().max().copied().unwrap())
            .collect();

        let ret_mins = MonoWedge::<T>::min_wedge().sliding(&values, width);
        let ret_maxs = MonoWedge::<T>::max_wedge().sliding(&values, width);

        assert_eq!(expected_mins, ret_mins, "window min incorrect");
        assert_eq!(expected_maxs, ret_maxs, "window max incorrect");
    }

    prop_compose! {
        fn vec_and_window()(vec in prop::collection::vec(any::<u64>(), 3..100))
                        (window_size in 0..vec.len() + 2, vec in Just(vec))
                        -> (Vec<u64>, usize) {
           (vec, window_size)
       }
    }

    proptest! {
        #[test]
        fn test_rolling_minmax((vec, width) in vec_and_window()) {
            run_test_min_max(vec, width)
        }
    }

    #[test]
    fn smoketest_1() {
        let vec: Vec<u64> = vec![
            14978539203261649134,
            16311637665202408393,
            14583675943388486036,
            1550360951880186785,
            14850777793052200443,
        ];
        let width: usize = 2;

        run_test_min_max(vec, width)
    }

    #[test]
    fn smoketest_2() {
        let vec: Vec<u64> = vec![0, 0, 0];
        let width: usize = 2;

        run_test_min_max(vec, width)
    }

    #[test]
    fn front_tracks_extremum() {
        let mut wedge = MonoWedge::<i32>::max_wedge();
        wedge.update((0, 3));
        wedge.update((1, 1));
        wedge.update((2, 2));
        assert_eq!(wedge.front(), Some((&0, &3)));
        wedge.purge_before(1);
        assert_eq!(wedge.front(), Some((&2, &2)));
    }
}
