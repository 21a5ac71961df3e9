//! Viewport windowing for long fixed-extent lists.
//!
//! Only the items intersecting the viewport (plus `overscan` on each side)
//! are materialized, so render cost follows the viewport, not the list
//! length. Every item is placed at `index * item_extent` from the origin,
//! which lets the host skip indices without shifting the siblings it does
//! draw.

use std::ops::Range;

/// Index range that must be materialized for the given geometry.
///
/// Never yields more than `ceil(viewport / item) + 2 * overscan` indices and
/// never an index outside `0..total`. With `overscan >= 1` every index whose
/// extent intersects the viewport is included; at zero overscan an unaligned
/// offset can leave the last partial row out. Degenerate input (zero or NaN
/// extents, negative offsets) is clamped, not rejected.
pub fn visible_range(
    total: usize,
    item_extent: f64,
    viewport_extent: f64,
    scroll_offset: f64,
    overscan: usize,
) -> Range<usize> {
    if total == 0 || !(item_extent > 0.0) || !item_extent.is_finite() {
        return 0..0;
    }
    let scroll = non_negative(scroll_offset);
    let viewport = non_negative(viewport_extent);

    // float → usize casts saturate, so huge offsets land on usize::MAX
    let first = (scroll / item_extent).floor() as usize;
    let visible = (viewport / item_extent).ceil() as usize;

    let end = first
        .saturating_add(visible)
        .saturating_add(overscan)
        .min(total);
    let start = first.saturating_sub(overscan).min(end);
    start..end
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Absolute position directive for one materialized item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub index: usize,
    /// Distance from the list origin to the item's leading edge.
    pub offset: f64,
    pub extent: f64,
}

/// Scroll/resize state of one list view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scroll_offset: f64,
    viewport_extent: f64,
    item_extent: f64,
    overscan: usize,
}

impl Viewport {
    pub fn new(viewport_extent: f64, item_extent: f64, overscan: usize) -> Self {
        Viewport {
            scroll_offset: 0.0,
            viewport_extent: non_negative(viewport_extent),
            item_extent: non_negative(item_extent),
            overscan,
        }
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn viewport_extent(&self) -> f64 {
        self.viewport_extent
    }

    pub fn item_extent(&self) -> f64 {
        self.item_extent
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn scroll_to(&mut self, offset: f64) {
        self.scroll_offset = non_negative(offset);
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.scroll_to(self.scroll_offset + delta);
    }

    /// Viewport changed size without any scroll event.
    pub fn resize(&mut self, viewport_extent: f64) {
        self.viewport_extent = non_negative(viewport_extent);
    }

    /// Total scrollable extent of `total` items.
    pub fn content_extent(&self, total: usize) -> f64 {
        total as f64 * self.item_extent
    }

    pub fn max_scroll(&self, total: usize) -> f64 {
        (self.content_extent(total) - self.viewport_extent).max(0.0)
    }

    /// Pull the offset back inside the content, e.g. after the list shrank.
    pub fn clamp_scroll(&mut self, total: usize) {
        self.scroll_offset = self.scroll_offset.min(self.max_scroll(total));
    }

    /// Scroll the minimum amount that makes `index` fully visible.
    /// Returns whether the offset changed.
    pub fn scroll_into_view(&mut self, index: usize, total: usize) -> bool {
        if index >= total {
            return false;
        }
        let top = index as f64 * self.item_extent;
        let bottom = top + self.item_extent;
        let before = self.scroll_offset;
        if top < self.scroll_offset {
            self.scroll_offset = top;
        } else if bottom > self.scroll_offset + self.viewport_extent {
            self.scroll_offset = (bottom - self.viewport_extent).max(0.0);
        }
        self.scroll_offset != before
    }

    pub fn range(&self, total: usize) -> Range<usize> {
        visible_range(
            total,
            self.item_extent,
            self.viewport_extent,
            self.scroll_offset,
            self.overscan,
        )
    }

    /// Borrow `items` for one render pass.
    pub fn window<'a, T>(&self, items: &'a [T]) -> Window<'a, T> {
        Window {
            items,
            range: self.range(items.len()),
            item_extent: self.item_extent,
        }
    }
}

/// The materialized slice of a sequence for one render pass.
#[derive(Debug)]
pub struct Window<'a, T> {
    items: &'a [T],
    range: Range<usize>,
    item_extent: f64,
}

impl<'a, T> Window<'a, T> {
    /// True when the whole sequence is empty; the host shows its empty state.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Height of the spacer the host sizes its scroll container to.
    pub fn content_extent(&self) -> f64 {
        self.items.len() as f64 * self.item_extent
    }

    pub fn iter(&self) -> impl Iterator<Item = (Placement, &'a T)> + '_ {
        let extent = self.item_extent;
        let start = self.range.start;
        let items: &'a [T] = self.items;
        let slice = &items[self.range.clone()];
        slice.iter().enumerate().map(move |(i, item)| {
            let index = start + i;
            (
                Placement {
                    index,
                    offset: index as f64 * extent,
                    extent,
                },
                item,
            )
        })
    }
}
