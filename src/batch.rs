//! Batched matrix and scalar descriptors
//!
//! A batched operation processes `batch_count` equal-shaped column-major
//! matrices in one call. Storage comes in two conventions: a single strided
//! region (item `b` starts `b * stride` elements past the base) or an array
//! of independent per-item references. Both are carried by [`BatchLayout`]
//! so that every operation handles either convention through one descriptor.
//!
//! Element (i, j) of item `b` resolves to `base[b] + shift + i + j * ld`,
//! in elements. Descriptors are cheap views: taking a sub-block is a shift
//! adjustment, never a copy.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::dtype::Element;

/// Column-major linear offset of element (i, j) for leading dimension `ld`
#[inline]
pub fn offset2d(i: usize, j: usize, ld: usize) -> usize {
    i + j * ld
}

/// Storage convention for a batch of equal-shaped matrices
#[derive(Debug, Clone)]
pub enum BatchLayout {
    /// One contiguous region; item `b` begins `b * stride` elements past `base`
    Strided {
        /// Device address of item 0
        base: u64,
        /// Inter-item spacing in elements
        stride: usize,
    },
    /// Independent per-item device references
    PerItem {
        /// Device address of each item
        bases: Arc<Vec<u64>>,
    },
}

/// View over a batch of column-major matrices sharing (ld, shift)
///
/// The descriptor holds no dimensions; row/column extents travel with each
/// call, so one allocation can be viewed at several shapes (the sub-block
/// views the builders take during blocked iteration).
#[derive(Debug, Clone)]
pub struct BatchedMatrix<T: Element> {
    layout: BatchLayout,
    shift: usize,
    ld: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> BatchedMatrix<T> {
    /// View over a single strided region
    pub fn strided(base: u64, stride: usize, ld: usize) -> Self {
        Self {
            layout: BatchLayout::Strided { base, stride },
            shift: 0,
            ld,
            _marker: PhantomData,
        }
    }

    /// View over an array of independent per-item references
    pub fn per_item(bases: Vec<u64>, ld: usize) -> Self {
        Self {
            layout: BatchLayout::PerItem {
                bases: Arc::new(bases),
            },
            shift: 0,
            ld,
            _marker: PhantomData,
        }
    }

    /// Leading dimension in elements
    #[inline]
    pub fn ld(&self) -> usize {
        self.ld
    }

    /// Current element offset applied to every item
    #[inline]
    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Storage layout of this view
    #[inline]
    pub fn layout(&self) -> &BatchLayout {
        &self.layout
    }

    /// Sub-block view advanced by `delta` elements into every item
    #[inline]
    pub fn shifted(&self, delta: usize) -> Self {
        Self {
            layout: self.layout.clone(),
            shift: self.shift + delta,
            ld: self.ld,
            _marker: PhantomData,
        }
    }

    /// Sub-block view starting at element (i, j) of this view
    #[inline]
    pub fn block(&self, i: usize, j: usize) -> Self {
        self.shifted(offset2d(i, j, self.ld))
    }

    /// Device byte address of element (0, 0) of item `b`
    #[inline]
    pub fn item_ptr(&self, b: usize) -> u64 {
        let elem = std::mem::size_of::<T>() as u64;
        match &self.layout {
            BatchLayout::Strided { base, stride } => {
                base + (b as u64 * *stride as u64 + self.shift as u64) * elem
            }
            BatchLayout::PerItem { bases } => bases[b] + self.shift as u64 * elem,
        }
    }

    /// Whether the view cannot address `batch_count` items
    ///
    /// True when the base reference is null, the reference array is shorter
    /// than the batch, or any referenced item is null.
    pub fn is_null(&self, batch_count: usize) -> bool {
        match &self.layout {
            BatchLayout::Strided { base, .. } => *base == 0,
            BatchLayout::PerItem { bases } => {
                bases.len() < batch_count || bases.iter().take(batch_count).any(|&p| p == 0)
            }
        }
    }
}

/// View over a per-item vector of reflector scalars (tau)
///
/// Stored as one strided region: item `b`'s scalar `j` lives at
/// `base + shift + j + b * stride` elements.
#[derive(Debug, Clone)]
pub struct BatchedScalars<T: Element> {
    base: u64,
    shift: usize,
    stride: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> BatchedScalars<T> {
    /// View over a strided scalar region
    pub fn strided(base: u64, stride: usize) -> Self {
        Self {
            base,
            shift: 0,
            stride,
            _marker: PhantomData,
        }
    }

    /// Device address of the start of the scalar region
    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Current element offset applied to every item
    #[inline]
    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Inter-item spacing in elements
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// View advanced by `delta` scalars into every item
    #[inline]
    pub fn shifted(&self, delta: usize) -> Self {
        Self {
            base: self.base,
            shift: self.shift + delta,
            stride: self.stride,
            _marker: PhantomData,
        }
    }

    /// Device byte address of scalar 0 of item `b`
    #[inline]
    pub fn item_ptr(&self, b: usize) -> u64 {
        let elem = std::mem::size_of::<T>() as u64;
        self.base + (b as u64 * self.stride as u64 + self.shift as u64) * elem
    }

    /// Whether the base reference is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.base == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset2d() {
        assert_eq!(offset2d(0, 0, 7), 0);
        assert_eq!(offset2d(3, 2, 7), 17);
    }

    #[test]
    fn test_strided_addressing() {
        let a = BatchedMatrix::<f64>::strided(0x1000, 100, 10);
        assert_eq!(a.item_ptr(0), 0x1000);
        assert_eq!(a.item_ptr(2), 0x1000 + 200 * 8);

        let sub = a.block(1, 3);
        assert_eq!(sub.shift(), 31);
        assert_eq!(sub.item_ptr(1), 0x1000 + (100 + 31) * 8);
    }

    #[test]
    fn test_per_item_addressing() {
        let a = BatchedMatrix::<f32>::per_item(vec![0x100, 0x900], 5);
        assert_eq!(a.item_ptr(1), 0x900);
        assert_eq!(a.block(2, 1).item_ptr(1), 0x900 + 7 * 4);
    }

    #[test]
    fn test_null_detection() {
        assert!(BatchedMatrix::<f32>::strided(0, 10, 5).is_null(1));
        assert!(BatchedMatrix::<f32>::per_item(vec![0x100], 5).is_null(2));
        assert!(BatchedMatrix::<f32>::per_item(vec![0x100, 0], 5).is_null(2));
        assert!(!BatchedMatrix::<f32>::per_item(vec![0x100, 0x200], 5).is_null(2));

        let tau = BatchedScalars::<f64>::strided(0, 4);
        assert!(tau.is_null());
    }

    #[test]
    fn test_scalar_addressing() {
        let tau = BatchedScalars::<f64>::strided(0x2000, 6);
        assert_eq!(tau.item_ptr(1), 0x2000 + 6 * 8);
        assert_eq!(tau.shifted(2).item_ptr(1), 0x2000 + 8 * 8);
    }
}
