/// Why a region of nesting depths has its entry probes suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Aggregate initializer or `enum` body: the braces open data, not
    /// executable scope. Sticky across nested braces until the depth unwinds.
    Data,

    /// `class`/`struct`/`switch` body: only the entry probe for this opening
    /// is suppressed; nested statements are still instrumented.
    Dispatch,
}

#[derive(Debug, Clone, Copy)]
struct SuppressionRegion {
    kind: RegionKind,
    /// Brace level just before the region's opening brace; the region ends
    /// when the depth unwinds back to this level.
    level: i32,
}

/// Brace-nesting state carried line to line within one file.
///
/// Tracks the signed nesting depth and a stack of suppression regions.
/// Call order per line: `line_start`, then `close` with the line's closing
/// brace count, then `open` with the opening count.
pub struct BraceTracker {
    level: i32,
    regions: Vec<SuppressionRegion>,
}

impl BraceTracker {
    pub fn new() -> Self {
        Self {
            level: 0,
            regions: Vec::new(),
        }
    }

    /// Current nesting depth. Negative depth means unbalanced braces.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Unwind regions whose depth has been closed out. Must run before the
    /// line's own braces are counted.
    pub fn line_start(&mut self) {
        while let Some(region) = self.regions.last() {
            if region.level >= self.level {
                self.regions.pop();
            } else {
                break;
            }
        }
    }

    /// Apply the line's closing braces.
    pub fn close(&mut self, dec: usize) {
        self.level -= dec as i32;
    }

    /// Apply the line's opening braces and decide whether the newly opened
    /// scope gets an entry probe. `data`/`dispatch` report what the opening
    /// construct looked like; returns true when a probe belongs right after
    /// the opening brace.
    pub fn open(&mut self, inc: usize, data: bool, dispatch: bool) -> bool {
        self.level += inc as i32;
        if data {
            self.regions.push(SuppressionRegion {
                kind: RegionKind::Data,
                level: self.level - 1,
            });
            return false;
        }
        if dispatch {
            self.regions.push(SuppressionRegion {
                kind: RegionKind::Dispatch,
                level: self.level - 1,
            });
            return false;
        }
        !self.in_data_region()
    }

    /// True while any data region is still open. Dispatch regions do not
    /// suppress their nested scopes.
    pub fn in_data_region(&self) -> bool {
        self.regions.iter().any(|r| r.kind == RegionKind::Data)
    }
}

impl Default for BraceTracker {
    fn default() -> Self {
        Self::new()
    }
}
