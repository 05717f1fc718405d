/// Per-instance boolean masks derived from decoded segmentation maps
use std::collections::BTreeMap;
use ndarray::{Array3, ArrayView2, Axis, Zip};

use crate::ade20k::segmentation::SegmentationMaps;

/// Stacked instance masks `[height, width, count]` with one class id per mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMasks {
    pub masks: Array3<bool>,
    pub class_ids: Vec<i32>,
}

impl InstanceMasks {
    /// No instances; the shape is `[0, 0, 0]`
    pub fn empty() -> Self {
        Self {
            masks: Array3::from_elem((0, 0, 0), false),
            class_ids: Vec::new(),
        }
    }

    /// Build one mask per distinct instance value, in ascending value order.
    /// The class of each mask is the integer median of the class map under it.
    /// Returns None when no instance has a non-empty mask.
    pub fn from_maps(maps: &SegmentationMaps) -> Option<Self> {
        // instance value -> class values under that instance
        let mut instances: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        Zip::from(&maps.instance_map)
            .and(&maps.class_map)
            .for_each(|&instance, &class| instances.entry(instance).or_default().push(class));

        let mut kept = Vec::with_capacity(instances.len());
        for (instance, mut classes) in instances {
            if classes.is_empty() {
                continue;
            }
            kept.push((instance, integer_median(&mut classes)));
        }
        if kept.is_empty() {
            return None;
        }

        let (height, width) = maps.instance_map.dim();
        let mut masks = Array3::from_elem((height, width, kept.len()), false);
        for (slot, &(instance, _)) in kept.iter().enumerate() {
            Zip::from(masks.index_axis_mut(Axis(2), slot))
                .and(&maps.instance_map)
                .for_each(|m, &v| *m = v == instance);
        }

        Some(Self {
            masks,
            class_ids: kept.into_iter().map(|(_, class)| class).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.class_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_ids.is_empty()
    }

    pub fn mask(&self, index: usize) -> ArrayView2<'_, bool> {
        self.masks.index_axis(Axis(2), index)
    }

    /// Number of pixels covered by mask `index`
    pub fn area(&self, index: usize) -> usize {
        self.mask(index).iter().filter(|&&m| m).count()
    }
}

/// Median of a non-empty sample; for an even count, the mean of the two
/// middle values truncated toward zero.
pub(crate) fn integer_median(values: &mut [u32]) -> i32 {
    let n = values.len();
    let mid = n / 2;
    let (lower, &mut upper, _) = values.select_nth_unstable(mid);
    let median = if n % 2 == 1 {
        upper as u64
    } else {
        // Largest element left of the upper middle is the lower middle
        let below = lower.iter().copied().max().unwrap_or(upper);
        (below as u64 + upper as u64) / 2
    };
    median as i32
}
