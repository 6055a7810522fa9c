//! Trace colors.
//!
//! A trace's color depends only on how many traces were in the store when
//! it was appended, so the Nth trace since the last clear always gets the
//! same hue regardless of which range it shows.

/// Fixed eight-hue palette, cycled in order.
pub const PALETTE: [&str; 8] = [
    "#1f77b4", // blue
    "#d62728", // red
    "#2ca02c", // green
    "#ff7f0e", // orange
    "#9467bd", // purple
    "#17becf", // cyan
    "#e377c2", // pink
    "#7f7f7f", // grey
];

/// Color for the trace at `index` in insertion order.
pub fn color_for_index(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}
