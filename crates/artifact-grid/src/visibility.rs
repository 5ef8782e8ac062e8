//! Visibility window tracking over an externally owned item sequence.
//!
//! The tracker keeps a contiguous, double-ended window of items that pass a
//! buffered viewport test. It never owns the items; it only classifies them
//! and reports transitions through a [`VisibilityObserver`].
//!
//! ## Update Algorithm
//!
//! 1. Shrink: pop either end while the boundary item is no longer visible.
//! 2. Grow: extend either end while the next sibling is visible.
//!
//! When the window is empty, a linear scan finds one visible anchor and the
//! window grows outward from it. `reset` runs the same anchor scan after the
//! sequence was mutated in a way other than append or prepend.

use std::collections::VecDeque;

use crate::config::DEFAULT_VISIBILITY_BUFFER_RATIO;

/// Scroll position and extent along the scrolling axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset: f64,
    pub extent: f64,
}

impl Viewport {
    pub fn new(offset: f64, extent: f64) -> Self {
        Self { offset, extent }
    }

    /// Bounds widened by `ratio * extent` at both ends.
    pub fn buffered(&self, ratio: f64) -> VisibleBounds {
        let margin = self.extent * ratio;
        VisibleBounds {
            start: self.offset - margin,
            end: self.offset + self.extent + margin,
        }
    }
}

/// Buffered range handed to the probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleBounds {
    pub start: f64,
    pub end: f64,
}

impl VisibleBounds {
    /// True when `[start, end)` overlaps these bounds.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        start < self.end && end > self.start
    }
}

/// Ordered, index-addressable item handles.
pub trait ItemSequence {
    type Item;

    fn len(&self) -> usize;
    fn item(&self, index: usize) -> Option<Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> ItemSequence for [T] {
    type Item = T;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn item(&self, index: usize) -> Option<T> {
        self.get(index).cloned()
    }
}

impl<T: Clone> ItemSequence for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn item(&self, index: usize) -> Option<T> {
        self.get(index).cloned()
    }
}

/// Injected visibility test.
pub trait VisibilityProbe<T> {
    fn is_visible(&self, item: &T, bounds: &VisibleBounds) -> bool;
}

impl<T, F> VisibilityProbe<T> for F
where
    F: Fn(&T, &VisibleBounds) -> bool,
{
    fn is_visible(&self, item: &T, bounds: &VisibleBounds) -> bool {
        self(item, bounds)
    }
}

pub trait VisibilityObserver<T> {
    fn on_enter(&mut self, item: &T);
    fn on_exit(&mut self, item: &T);
}

/// Observer that records transitions in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChange<T> {
    pub entered: Vec<T>,
    pub exited: Vec<T>,
}

impl<T> Default for VisibilityChange<T> {
    fn default() -> Self {
        Self {
            entered: Vec::new(),
            exited: Vec::new(),
        }
    }
}

impl<T> VisibilityChange<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

impl<T: Clone> VisibilityObserver<T> for VisibilityChange<T> {
    fn on_enter(&mut self, item: &T) {
        self.entered.push(item.clone());
    }

    fn on_exit(&mut self, item: &T) {
        self.exited.push(item.clone());
    }
}

#[derive(Debug, Clone)]
pub struct VisibilityTracker<T> {
    window: VecDeque<T>,
    start: usize,
    buffer_ratio: f64,
    viewport: Viewport,
}

impl<T: Clone + PartialEq> VisibilityTracker<T> {
    pub fn new(viewport: Viewport) -> Self {
        Self::with_buffer_ratio(viewport, DEFAULT_VISIBILITY_BUFFER_RATIO)
    }

    pub fn with_buffer_ratio(viewport: Viewport, buffer_ratio: f64) -> Self {
        Self {
            window: VecDeque::new(),
            start: 0,
            buffer_ratio,
            viewport,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Records a scroll or resize. Call [`Self::update`] afterwards.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn bounds(&self) -> VisibleBounds {
        self.viewport.buffered(self.buffer_ratio)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Sequence index of the first tracked item.
    pub fn start_index(&self) -> usize {
        self.start
    }

    pub fn visible(&self) -> impl Iterator<Item = &T> {
        self.window.iter()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.window.contains(item)
    }

    /// Shifts tracked indices after `count` items were inserted at the front.
    pub fn notify_prepended(&mut self, count: usize) {
        self.start += count;
    }

    /// Incremental shrink-then-grow pass for one scroll or resize tick.
    pub fn update<S, P, O>(&mut self, sequence: &S, probe: &P, observer: &mut O)
    where
        S: ItemSequence<Item = T> + ?Sized,
        P: VisibilityProbe<T> + ?Sized,
        O: VisibilityObserver<T> + ?Sized,
    {
        let bounds = self.bounds();
        self.shrink(probe, &bounds, observer);
        if self.window.is_empty() {
            self.anchor(sequence, probe, &bounds, observer);
        } else {
            self.grow(sequence, probe, &bounds, observer);
        }
    }

    /// Rebuilds the window from scratch.
    ///
    /// Items visible both before and after the reset produce no callbacks;
    /// items that left get one exit and newcomers one enter.
    pub fn reset<S, P, O>(&mut self, sequence: &S, probe: &P, observer: &mut O)
    where
        S: ItemSequence<Item = T> + ?Sized,
        P: VisibilityProbe<T> + ?Sized,
        O: VisibilityObserver<T> + ?Sized,
    {
        let previous = std::mem::take(&mut self.window);
        self.start = 0;

        let bounds = self.bounds();
        let mut rebuilt = VisibilityChange::new();
        self.anchor(sequence, probe, &bounds, &mut rebuilt);

        for item in previous.iter().filter(|item| !self.window.contains(item)) {
            observer.on_exit(item);
        }
        for item in rebuilt.entered.iter().filter(|item| !previous.contains(item)) {
            observer.on_enter(item);
        }
    }

    fn shrink<P, O>(&mut self, probe: &P, bounds: &VisibleBounds, observer: &mut O)
    where
        P: VisibilityProbe<T> + ?Sized,
        O: VisibilityObserver<T> + ?Sized,
    {
        while let Some(front) = self.window.front() {
            if probe.is_visible(front, bounds) {
                break;
            }
            if let Some(item) = self.window.pop_front() {
                self.start += 1;
                observer.on_exit(&item);
            }
        }
        while let Some(back) = self.window.back() {
            if probe.is_visible(back, bounds) {
                break;
            }
            if let Some(item) = self.window.pop_back() {
                observer.on_exit(&item);
            }
        }
        if self.window.is_empty() {
            self.start = 0;
        }
    }

    fn grow<S, P, O>(&mut self, sequence: &S, probe: &P, bounds: &VisibleBounds, observer: &mut O)
    where
        S: ItemSequence<Item = T> + ?Sized,
        P: VisibilityProbe<T> + ?Sized,
        O: VisibilityObserver<T> + ?Sized,
    {
        while let Some(item) = sequence.item(self.start + self.window.len()) {
            if !probe.is_visible(&item, bounds) {
                break;
            }
            observer.on_enter(&item);
            self.window.push_back(item);
        }
        while self.start > 0 {
            let Some(item) = sequence.item(self.start - 1) else {
                break;
            };
            if !probe.is_visible(&item, bounds) {
                break;
            }
            observer.on_enter(&item);
            self.window.push_front(item);
            self.start -= 1;
        }
    }

    fn anchor<S, P, O>(
        &mut self,
        sequence: &S,
        probe: &P,
        bounds: &VisibleBounds,
        observer: &mut O,
    ) where
        S: ItemSequence<Item = T> + ?Sized,
        P: VisibilityProbe<T> + ?Sized,
        O: VisibilityObserver<T> + ?Sized,
    {
        for index in 0..sequence.len() {
            let Some(item) = sequence.item(index) else {
                continue;
            };
            if probe.is_visible(&item, bounds) {
                self.start = index;
                observer.on_enter(&item);
                self.window.push_back(item);
                self.grow(sequence, probe, bounds, observer);
                return;
            }
        }
        self.start = 0;
    }
}
