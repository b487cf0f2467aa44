//! Replay tests: renderer output fed through the terminal model.
//!
//! Every render is replayed into a [`TerminalModel`] and the resulting
//! screen is compared cell by cell with the frame that was rendered:
//! - fixed scenarios (wide glyphs, styles, shrinking rows, resizes)
//! - both merge strategies and a tight segment cap
//! - property tests over random frame sequences

use glyphdiff_core::ClipRect;
use glyphdiff_render::diff::{DiffConfig, MergeStrategy};
use glyphdiff_render::paint::{OperationLog, PaintTarget};
use glyphdiff_render::renderer::{FrameRenderer, RenderOptions, RenderStats, RendererConfig};
use glyphdiff_render::style::StylePair;
use glyphdiff_render::terminal_model::TerminalModel;

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    renderer: FrameRenderer<Vec<u8>>,
    model: TerminalModel,
}

impl Harness {
    fn new(config: RendererConfig, model_width: usize, model_height: usize) -> Self {
        Self {
            renderer: FrameRenderer::new(Vec::new(), config),
            model: TerminalModel::new(model_width, model_height),
        }
    }

    /// Paint `lines`, render, replay, and check the screen.
    fn step(&mut self, width: u16, lines: &[&str], options: RenderOptions) -> RenderStats {
        let mut surface = self.renderer.begin_frame(width, lines.len() as u16);
        for (y, line) in lines.iter().enumerate() {
            surface.write(0, y as i32, line, &[]);
        }
        drop(surface);

        let stats = self.renderer.render(options).unwrap();
        let bytes = std::mem::take(self.renderer.sink_mut());
        assert_eq!(stats.bytes_emitted, bytes.len());
        self.model.process(&bytes);
        self.check(lines);
        stats
    }

    fn check(&self, lines: &[&str]) {
        let front = self.renderer.front().expect("frame rendered");
        if let Some(mismatch) = self.model.diff_frame(front, self.renderer.registry(), 0) {
            panic!("screen differs after {lines:?}: {mismatch}");
        }
        assert_eq!(self.model.cursor(), (0, lines.len()), "cursor after {lines:?}");
        assert_eq!(self.model.scrolled(), 0);
    }
}

fn configs() -> [RendererConfig; 3] {
    let base = RendererConfig::default();
    [
        base,
        base.with_diff(DiffConfig::default().with_strategy(MergeStrategy::Threshold)),
        base.with_diff(DiffConfig::default().with_max_segments(1)),
    ]
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn wide_glyph_replacement() {
    for config in configs() {
        let mut h = Harness::new(config, 10, 3);
        h.step(10, &["ab中cd"], RenderOptions::default());
        let stats = h.step(10, &["ab文cd"], RenderOptions::default());
        assert!(!stats.full_redraw);
    }
}

#[test]
fn wide_glyph_overwritten_by_narrow() {
    for config in configs() {
        let mut h = Harness::new(config, 10, 3);
        h.step(10, &["中文字", "x"], RenderOptions::default());
        h.step(10, &["a文b", "x"], RenderOptions::default());
        h.step(10, &[" 中 ", "中"], RenderOptions::default());
    }
}

#[test]
fn styled_rows_patch_cleanly() {
    for config in configs() {
        let mut h = Harness::new(config, 16, 4);
        h.step(
            16,
            &["\x1b[1mbold\x1b[22m plain", "\x1b[31mred\x1b[39m"],
            RenderOptions::default(),
        );
        h.step(
            16,
            &["\x1b[1mBOLD\x1b[22m plain", "\x1b[32mred\x1b[39m!"],
            RenderOptions::default(),
        );
        h.step(
            16,
            &["bold \x1b[4mplain\x1b[24m", ""],
            RenderOptions::default(),
        );
    }
}

#[test]
fn shrinking_and_growing_rows() {
    for config in configs() {
        let mut h = Harness::new(config, 12, 4);
        h.step(12, &["abcdefghijkl", "short", "x"], RenderOptions::default());
        h.step(12, &["xbcdefgh", "shorter row", ""], RenderOptions::default());
        h.step(12, &["", "s", "full width!!"], RenderOptions::default());
    }
}

#[test]
fn width_change_redraws_everything() {
    let mut h = Harness::new(RendererConfig::default().with_show_cursor(true), 8, 3);
    h.step(5, &["hello"], RenderOptions::default());
    let stats = h.step(6, &["hello!"], RenderOptions::default());
    assert!(stats.full_redraw);
    assert_eq!(stats.rows_patched, 0);
    assert_eq!(stats.bytes_emitted, "\x1b[2K\x1b[1A\x1b[2K\x1b[Ghello!\n".len());
}

#[test]
fn height_change_redraws_everything() {
    let mut h = Harness::new(RendererConfig::default(), 8, 5);
    h.step(8, &["one", "two", "three"], RenderOptions::default());
    let stats = h.step(8, &["one"], RenderOptions::default());
    assert!(stats.full_redraw);
    h.step(8, &["one", "two"], RenderOptions::default());
}

#[test]
fn forced_full_redraw_matches_incremental() {
    let mut h = Harness::new(RendererConfig::default(), 8, 3);
    h.step(8, &["abc", "def"], RenderOptions::default());
    let stats = h.step(8, &["abd", "def"], RenderOptions::full());
    assert!(stats.full_redraw);
    assert_eq!(stats.rows_rewritten, 2);
}

#[test]
fn clear_then_render_starts_fresh() {
    let mut h = Harness::new(RendererConfig::default(), 8, 3);
    h.step(8, &["abc", "def"], RenderOptions::default());
    h.renderer.clear().unwrap();
    let bytes = std::mem::take(h.renderer.sink_mut());
    h.model.process(&bytes);
    assert_eq!(h.model.cursor(), (0, 0));
    assert_eq!(h.model.screen_text().trim(), "");

    let stats = h.step(8, &["xyz"], RenderOptions::default());
    assert!(stats.full_redraw);
}

#[test]
fn cursor_visibility_follows_lifecycle() {
    let mut h = Harness::new(RendererConfig::default(), 8, 3);
    h.step(8, &["a"], RenderOptions::default());
    assert!(!h.model.cursor_visible());
    h.renderer.done().unwrap();
    let bytes = std::mem::take(h.renderer.sink_mut());
    h.model.process(&bytes);
    assert!(h.model.cursor_visible());
}

#[test]
fn operation_log_replays_into_renderer_frame() {
    let mut log = OperationLog::new(10, 2);
    log.clip(ClipRect::new(2, 0, 4, 2));
    log.write(0, 0, "0123456789", &[]);
    log.unclip();
    log.fill(0, 1, 10, "-", 1, &[StylePair::new("\x1b[2m", "\x1b[22m")]);

    let mut renderer = FrameRenderer::new(Vec::new(), RendererConfig::default());
    let mut surface = renderer.begin_frame(10, 2);
    for op in log.ops() {
        op.apply(&mut surface);
    }
    drop(surface);
    renderer.render(RenderOptions::default()).unwrap();

    let mut model = TerminalModel::new(10, 3);
    model.process(renderer.sink());
    let front = renderer.front().unwrap();
    assert_eq!(model.diff_frame(front, renderer.registry(), 0), None);
    assert_eq!(model.row_text(0).unwrap().trim_end(), "  2345");
    assert_eq!(model.row_text(1).unwrap(), "----------");
}

// ============================================================================
// Properties
// ============================================================================

mod proptests {
    use super::*;
    use proptest::prelude::*;

    const TOKENS: &[&str] = &[
        "a",
        "b",
        "c",
        " ",
        "  ",
        "中",
        "文",
        "e\u{301}",
        "\x1b[1mB\x1b[22m",
        "\x1b[31mr\x1b[39m",
        "\x1b[4m_u\x1b[24m",
    ];

    fn line() -> impl Strategy<Value = String> {
        proptest::collection::vec(proptest::sample::select(TOKENS), 0..9)
            .prop_map(|tokens| tokens.concat())
    }

    fn screen() -> impl Strategy<Value = (u16, Vec<String>, bool)> {
        (
            prop_oneof![4 => Just(10u16), 1 => Just(7u16)],
            proptest::collection::vec(line(), 3..=3),
            proptest::bool::weighted(0.1),
        )
    }

    fn strategy_config() -> impl Strategy<Value = RendererConfig> {
        (any::<bool>(), 0u16..4, 0usize..5, 0usize..14).prop_map(
            |(threshold, gap, penalty, max)| {
                let strategy = if threshold {
                    MergeStrategy::Threshold
                } else {
                    MergeStrategy::Cost
                };
                RendererConfig::default().with_diff(
                    DiffConfig::default()
                        .with_strategy(strategy)
                        .with_merge_threshold(gap)
                        .with_gap_overwrite_penalty(penalty)
                        .with_max_segments(max),
                )
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn replayed_screen_matches_every_frame(
            config in strategy_config(),
            screens in proptest::collection::vec(screen(), 1..6),
        ) {
            let mut h = Harness::new(config, 10, 4);
            for (width, lines, force) in &screens {
                let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
                let options = RenderOptions { force_full: *force };
                h.step(*width, &lines, options);
            }
        }

        #[test]
        fn every_row_is_accounted_for(
            screens in proptest::collection::vec(proptest::collection::vec(line(), 3..=3), 2..5),
        ) {
            let mut h = Harness::new(RendererConfig::default(), 10, 4);
            for lines in &screens {
                let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
                let stats = h.step(10, &lines, RenderOptions::default());
                prop_assert_eq!(
                    stats.rows_unchanged + stats.rows_patched + stats.rows_rewritten,
                    3
                );
            }
        }
    }
}
