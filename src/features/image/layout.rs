//! Best 30 网格布局
//!
//! 纯函数：排名结果 -> 绘制指令。不做任何 I/O，曲绘与背景只以占位引用出现，
//! 由渲染阶段按 [`ImageSource`] 解析。

use crate::features::catalog::models::DifficultyCategory;
use crate::features::ranking::{ClearKind, Ranking, TOP_N};

pub const CANVAS_WIDTH: f64 = 1000.0;
pub const CANVAS_HEIGHT: f64 = 1500.0;
/// 顶部标题栏高度
pub const HEADER_HEIGHT: f64 = 32.0;
pub const GUTTER_WIDTH: f64 = 30.0;
pub const GUTTER_HEIGHT: f64 = 35.0;
pub const COLUMNS: usize = 3;
pub const ROWS: usize = 10;
pub const CARD_WIDTH: f64 = (CANVAS_WIDTH - GUTTER_WIDTH * 4.0) / 3.0;
pub const CARD_HEIGHT: f64 = (CANVAS_HEIGHT - HEADER_HEIGHT - GUTTER_HEIGHT * 11.0) / 10.0;

pub const JACKET_PADDING: f64 = 15.0;
/// 曲绘边长（正方形，等于卡片内高）
pub const JACKET_SIZE: f64 = CARD_HEIGHT - JACKET_PADDING * 2.0;

pub const BADGE_WIDTH: f64 = 37.0;
pub const BADGE_HEIGHT: f64 = 22.0;
const BADGE_RADIUS: f64 = 10.0;

pub const INDICATOR_SIZE: f64 = 36.0;
const CARD_RADIUS: f64 = 2.0;

const FC_COLOR: &str = "#FE83FE";
const AP_PINK: &str = "#FF8EFF";
const AP_TEAL: &str = "#00E3C7";
const SHADOW_COLOR: &str = "#00194a";
const HEADER_COLOR: &str = "#b4ccfa";

pub const TITLE_TEXT: &str = "Your best 30 charts";
const HEADER_FONT_SIZE: f64 = 24.0;
const NAME_FONT_SIZE: f64 = 20.0;
const NAME_LINE_HEIGHT: f64 = 1.2;
const BADGE_FONT_SIZE: f64 = 14.0;
const INDICATOR_FONT_SIZE: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 网格单元（列、行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub column: usize,
    pub row: usize,
}

impl GridCell {
    /// 卡片左上角像素坐标
    pub fn origin(self) -> Point {
        let col = self.column as f64;
        let row = self.row as f64;
        Point::new(
            col * CARD_WIDTH + GUTTER_WIDTH * (col + 1.0),
            HEADER_HEIGHT + row * CARD_HEIGHT + GUTTER_HEIGHT * (row + 1.0),
        )
    }
}

/// 名次 -> 网格单元；超出 30 名返回 `None`
pub fn cell_for_rank(rank: usize) -> Option<GridCell> {
    (rank < TOP_N).then_some(GridCell {
        column: rank % COLUMNS,
        row: rank / COLUMNS,
    })
}

// ---------------- 样式 ----------------

/// 线性渐变；坐标位于引用它的图形的局部坐标系
#[derive(Debug, PartialEq)]
pub struct LinearGradient {
    pub id: &'static str,
    pub from: Point,
    pub to: Point,
    pub stops: &'static [(f64, &'static str)],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Solid(&'static str),
    Linear(&'static LinearGradient),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub paint: Paint,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: &'static str,
    pub blur: f64,
    pub offset: Point,
    pub opacity: f64,
}

#[derive(Debug, PartialEq)]
pub struct CardStyle {
    pub fill: Paint,
    pub stroke: Stroke,
    pub corner_radius: f64,
    pub shadow: Shadow,
}

#[derive(Debug, PartialEq)]
pub struct BadgeStyle {
    pub fill: Paint,
    pub stroke: Option<Stroke>,
}

/// 右下角标形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorShape {
    /// Append 专用的八角星
    Star,
    Diamond,
}

impl IndicatorShape {
    /// 局部坐标下的顶点（INDICATOR_SIZE 见方）
    pub fn points(self) -> &'static [Point] {
        match self {
            Self::Star => &STAR_POINTS,
            Self::Diamond => &DIAMOND_POINTS,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct IndicatorStyle {
    pub shape: IndicatorShape,
    pub fill: Paint,
    pub stroke: Stroke,
    pub shadow: Shadow,
    pub label: &'static str,
}

/// 单元格完整样式
#[derive(Debug, PartialEq)]
pub struct CellStyle {
    pub card: &'static CardStyle,
    pub badge: &'static BadgeStyle,
    pub indicator: IndicatorStyle,
}

const S: f64 = INDICATOR_SIZE;

static STAR_POINTS: [Point; 8] = [
    Point::new(0.0, 0.0),
    Point::new(S / 2.0, S / 7.0),
    Point::new(S, 0.0),
    Point::new(S - S / 7.0, S / 2.0),
    Point::new(S, S),
    Point::new(S / 2.0, S - S / 7.0),
    Point::new(0.0, S),
    Point::new(S / 7.0, S / 2.0),
];

static DIAMOND_POINTS: [Point; 4] = [
    Point::new(S / 2.0, 0.0),
    Point::new(S, S / 2.0),
    Point::new(S / 2.0, S),
    Point::new(0.0, S / 2.0),
];

static AP_CARD_STROKE: LinearGradient = LinearGradient {
    id: "ap-card-stroke",
    from: Point::new(CARD_WIDTH / 2.0, 0.0),
    to: Point::new(CARD_WIDTH / 2.0, CARD_HEIGHT),
    stops: &[(0.0, AP_PINK), (1.0, AP_TEAL)],
};

static AP_CARD_FILL: LinearGradient = LinearGradient {
    id: "ap-card-fill",
    from: Point::new(CARD_WIDTH, 0.0),
    to: Point::new(0.0, CARD_HEIGHT),
    stops: &[(0.0, "white"), (1.0, "#f2feff")],
};

static APPEND_BADGE_FILL: LinearGradient = LinearGradient {
    id: "append-badge-fill",
    from: Point::new(0.0, 0.0),
    to: Point::new(BADGE_WIDTH, BADGE_HEIGHT),
    stops: &[(0.0, "#7857ff"), (1.0, "#fcacf7")],
};

static AP_INDICATOR_FILL: LinearGradient = LinearGradient {
    id: "ap-indicator-fill",
    from: Point::new(S / 2.0, 0.0),
    to: Point::new(S / 2.0, S),
    stops: &[(0.0, AP_PINK), (0.3, AP_PINK), (0.7, AP_TEAL), (1.0, AP_TEAL)],
};

const CARD_SHADOW: Shadow = Shadow {
    color: SHADOW_COLOR,
    blur: 5.0,
    offset: Point::new(0.0, 2.0),
    opacity: 0.0,
};

const SOFT_SHADOW: Shadow = Shadow {
    opacity: 0.5,
    ..CARD_SHADOW
};

static AP_CARD: CardStyle = CardStyle {
    fill: Paint::Linear(&AP_CARD_FILL),
    stroke: Stroke {
        paint: Paint::Linear(&AP_CARD_STROKE),
        width: 5.0,
    },
    corner_radius: CARD_RADIUS,
    shadow: CARD_SHADOW,
};

static FC_CARD: CardStyle = CardStyle {
    fill: Paint::Solid("white"),
    stroke: Stroke {
        paint: Paint::Solid(FC_COLOR),
        width: 2.0,
    },
    corner_radius: CARD_RADIUS,
    shadow: CARD_SHADOW,
};

static EXPERT_BADGE: BadgeStyle = BadgeStyle {
    fill: Paint::Solid("#FF457A"),
    stroke: None,
};

static MASTER_BADGE: BadgeStyle = BadgeStyle {
    fill: Paint::Solid("#781c94"),
    stroke: None,
};

static APPEND_BADGE: BadgeStyle = BadgeStyle {
    fill: Paint::Linear(&APPEND_BADGE_FILL),
    stroke: Some(Stroke {
        paint: Paint::Solid("white"),
        width: 2.0,
    }),
};

const INDICATOR_STROKE: Stroke = Stroke {
    paint: Paint::Solid("black"),
    width: 2.0,
};

const fn cell(
    card: &'static CardStyle,
    badge: &'static BadgeStyle,
    shape: IndicatorShape,
    fill: Paint,
    label: &'static str,
) -> CellStyle {
    CellStyle {
        card,
        badge,
        indicator: IndicatorStyle {
            shape,
            fill,
            stroke: INDICATOR_STROKE,
            shadow: SOFT_SHADOW,
            label,
        },
    }
}

/// 样式表：[通关类型][难度分类]
static STYLE_TABLE: [[CellStyle; 3]; 2] = [
    [
        cell(&FC_CARD, &EXPERT_BADGE, IndicatorShape::Diamond, Paint::Solid(FC_COLOR), "FC"),
        cell(&FC_CARD, &MASTER_BADGE, IndicatorShape::Diamond, Paint::Solid(FC_COLOR), "FC"),
        cell(&FC_CARD, &APPEND_BADGE, IndicatorShape::Star, Paint::Solid(FC_COLOR), "FC"),
    ],
    [
        cell(&AP_CARD, &EXPERT_BADGE, IndicatorShape::Diamond, Paint::Linear(&AP_INDICATOR_FILL), "AP"),
        cell(&AP_CARD, &MASTER_BADGE, IndicatorShape::Diamond, Paint::Linear(&AP_INDICATOR_FILL), "AP"),
        cell(&AP_CARD, &APPEND_BADGE, IndicatorShape::Star, Paint::Linear(&AP_INDICATOR_FILL), "AP"),
    ],
];

/// 查样式表
pub fn style_for(kind: ClearKind, category: DifficultyCategory) -> &'static CellStyle {
    &STYLE_TABLE[kind.index()][category.index()]
}

// ---------------- 绘制指令 ----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
}

/// 文本框；换行与省略在渲染阶段按框尺寸完成
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    pub text: String,
    pub font_size: f64,
    pub line_height: f64,
    pub fill: &'static str,
    pub align: HAlign,
    pub valign: VAlign,
    /// 按词换行，超出行数时末行省略
    pub wrap: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Background,
    Jacket { song_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect {
        origin: Point,
        width: f64,
        height: f64,
        corner_radius: f64,
        fill: Paint,
        stroke: Option<Stroke>,
        shadow: Option<Shadow>,
    },
    Polygon {
        origin: Point,
        points: &'static [Point],
        fill: Paint,
        stroke: Option<Stroke>,
        shadow: Option<Shadow>,
    },
    Text(TextBox),
    Image {
        origin: Point,
        width: f64,
        height: f64,
        source: ImageSource,
    },
}

/// 一张图的全部绘制指令（按绘制顺序）
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub ops: Vec<DrawOp>,
}

impl Scene {
    /// 需要拉取的曲绘（去重，保持首次出现顺序）
    pub fn jacket_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for op in &self.ops {
            if let DrawOp::Image {
                source: ImageSource::Jacket { song_id },
                ..
            } = op
                && !ids.contains(song_id)
            {
                ids.push(song_id.clone());
            }
        }
        ids
    }
}

fn header_ops(ranking: &Ranking) -> [DrawOp; 3] {
    let label = |origin: Point, width: f64, content: String, align: HAlign| {
        DrawOp::Text(TextBox {
            origin,
            width,
            height: HEADER_HEIGHT,
            text: content,
            font_size: HEADER_FONT_SIZE,
            line_height: 1.0,
            fill: "black",
            align,
            valign: VAlign::Top,
            wrap: false,
        })
    };
    [
        DrawOp::Rect {
            origin: Point::new(0.0, 0.0),
            width: CANVAS_WIDTH,
            height: HEADER_HEIGHT,
            corner_radius: 0.0,
            fill: Paint::Solid(HEADER_COLOR),
            stroke: None,
            shadow: Some(SOFT_SHADOW),
        },
        label(
            Point::new(5.0, 5.0),
            CANVAS_WIDTH - 10.0,
            TITLE_TEXT.to_string(),
            HAlign::Left,
        ),
        label(
            Point::new(0.0, 5.0),
            CANVAS_WIDTH - 5.0,
            format!("Ranking: {}", ranking.formatted_score()),
            HAlign::Right,
        ),
    ]
}

/// 由排名结果生成场景
pub fn build_scene(ranking: &Ranking) -> Scene {
    let mut ops = Vec::with_capacity(4 + ranking.entries.len() * 7);

    ops.push(DrawOp::Image {
        origin: Point::new(0.0, 0.0),
        width: CANVAS_WIDTH,
        height: CANVAS_HEIGHT,
        source: ImageSource::Background,
    });
    ops.extend(header_ops(ranking));

    for (rank, entry) in ranking.entries.iter().enumerate() {
        let Some(cell) = cell_for_rank(rank) else {
            break;
        };
        let Point { x, y } = cell.origin();
        let style = style_for(entry.clear_kind, entry.chart.difficulty);

        ops.push(DrawOp::Rect {
            origin: Point::new(x, y),
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
            corner_radius: style.card.corner_radius,
            fill: style.card.fill,
            stroke: Some(style.card.stroke),
            shadow: Some(style.card.shadow),
        });

        ops.push(DrawOp::Image {
            origin: Point::new(x + JACKET_PADDING, y + JACKET_PADDING),
            width: JACKET_SIZE,
            height: JACKET_SIZE,
            source: ImageSource::Jacket {
                song_id: entry.chart.song_id.clone(),
            },
        });

        ops.push(DrawOp::Text(TextBox {
            origin: Point::new(x + 2.0 * JACKET_PADDING + JACKET_SIZE, y + JACKET_PADDING),
            width: CARD_WIDTH - 3.0 * JACKET_PADDING - JACKET_SIZE,
            height: JACKET_SIZE,
            text: entry.chart.song_name_en.clone(),
            font_size: NAME_FONT_SIZE,
            line_height: NAME_LINE_HEIGHT,
            fill: "black",
            align: HAlign::Left,
            valign: VAlign::Middle,
            wrap: true,
        }));

        // 难度徽章居中于卡片左上角
        let badge = Point::new(x - BADGE_WIDTH / 2.0, y - BADGE_HEIGHT / 2.0);
        ops.push(DrawOp::Rect {
            origin: badge,
            width: BADGE_WIDTH,
            height: BADGE_HEIGHT,
            corner_radius: BADGE_RADIUS,
            fill: style.badge.fill,
            stroke: style.badge.stroke,
            shadow: None,
        });
        ops.push(DrawOp::Text(TextBox {
            origin: Point::new(badge.x, badge.y + 1.0),
            width: BADGE_WIDTH,
            height: BADGE_HEIGHT,
            text: format!("{:.1}", entry.effective_difficulty),
            font_size: BADGE_FONT_SIZE,
            line_height: 1.0,
            fill: "white",
            align: HAlign::Center,
            valign: VAlign::Middle,
            wrap: false,
        }));

        // AP/FC 角标居中于卡片右下角
        let ind = &style.indicator;
        let corner = Point::new(
            x + CARD_WIDTH - INDICATOR_SIZE / 2.0,
            y + CARD_HEIGHT - INDICATOR_SIZE / 2.0,
        );
        ops.push(DrawOp::Polygon {
            origin: corner,
            points: ind.shape.points(),
            fill: ind.fill,
            stroke: Some(ind.stroke),
            shadow: Some(ind.shadow),
        });
        ops.push(DrawOp::Text(TextBox {
            origin: corner,
            width: INDICATOR_SIZE,
            height: INDICATOR_SIZE,
            text: ind.label.to_string(),
            font_size: INDICATOR_FONT_SIZE,
            line_height: 1.0,
            fill: "white",
            align: HAlign::Center,
            valign: VAlign::Middle,
            wrap: false,
        }));
    }

    Scene {
        width: CANVAS_WIDTH,
        height: CANVAS_HEIGHT,
        ops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::catalog::models::{ChartCatalog, test_chart};
    use crate::features::ranking::{ClearStates, compute_ranking};
    use std::collections::HashSet;

    const EPS: f64 = 1e-9;

    #[test]
    fn geometry_constants() {
        assert!((CARD_WIDTH - 880.0 / 3.0).abs() < EPS);
        assert!((CARD_HEIGHT - 108.3).abs() < EPS);
        assert!((JACKET_SIZE - 78.3).abs() < EPS);
    }

    #[test]
    fn ranks_map_to_distinct_cells() {
        let mut seen = HashSet::new();
        for r in 0..TOP_N {
            let cell = cell_for_rank(r).expect("rank within grid");
            assert_eq!(cell.column, r % 3);
            assert_eq!(cell.row, r / 3);
            assert!(cell.row < ROWS);
            assert!(seen.insert(cell));
        }
        assert_eq!(cell_for_rank(TOP_N), None);
    }

    #[test]
    fn cell_origin_follows_gutter_formula() {
        let p = cell_for_rank(0).expect("cell").origin();
        assert!((p.x - 30.0).abs() < EPS);
        assert!((p.y - 67.0).abs() < EPS);

        let p = cell_for_rank(4).expect("cell").origin();
        assert!((p.x - (CARD_WIDTH + 60.0)).abs() < EPS);
        assert!((p.y - (32.0 + CARD_HEIGHT + 70.0)).abs() < EPS);

        // 最后一张卡片不越出画布
        let p = cell_for_rank(29).expect("cell").origin();
        assert!(p.x + CARD_WIDTH <= CANVAS_WIDTH);
        assert!(p.y + CARD_HEIGHT <= CANVAS_HEIGHT);
    }

    #[test]
    fn style_table_covers_every_combination() {
        for kind in ClearKind::ALL {
            for category in DifficultyCategory::ALL {
                let style = style_for(kind, category);
                assert_eq!(style.indicator.label, kind.label());

                let expected_shape = if category == DifficultyCategory::Append {
                    IndicatorShape::Star
                } else {
                    IndicatorShape::Diamond
                };
                assert_eq!(style.indicator.shape, expected_shape);

                match kind {
                    ClearKind::Ap => {
                        assert_eq!(style.card.stroke.width, 5.0);
                        assert!(matches!(style.card.stroke.paint, Paint::Linear(g) if g.id == "ap-card-stroke"));
                        assert!(matches!(style.indicator.fill, Paint::Linear(g) if g.stops.len() == 4));
                    }
                    ClearKind::Fc => {
                        assert_eq!(style.card.stroke, Stroke { paint: Paint::Solid(FC_COLOR), width: 2.0 });
                        assert_eq!(style.card.fill, Paint::Solid("white"));
                        assert_eq!(style.indicator.fill, Paint::Solid(FC_COLOR));
                    }
                }
            }
        }
        assert_eq!(
            style_for(ClearKind::Fc, DifficultyCategory::Expert).badge.fill,
            Paint::Solid("#FF457A")
        );
        assert_eq!(
            style_for(ClearKind::Ap, DifficultyCategory::Master).badge.fill,
            Paint::Solid("#781c94")
        );
        assert!(style_for(ClearKind::Ap, DifficultyCategory::Append).badge.stroke.is_some());
    }

    #[test]
    fn indicator_shapes_fit_their_box() {
        assert_eq!(IndicatorShape::Star.points().len(), 8);
        assert_eq!(IndicatorShape::Diamond.points().len(), 4);
        for p in IndicatorShape::Star.points().iter().chain(IndicatorShape::Diamond.points()) {
            assert!((0.0..=INDICATOR_SIZE).contains(&p.x));
            assert!((0.0..=INDICATOR_SIZE).contains(&p.y));
        }
    }

    fn ranking_for(pairs: &[(&str, &str)]) -> Ranking {
        let catalog = ChartCatalog::from_charts([
            test_chart("1", DifficultyCategory::Append, 15.0),
            test_chart("1", DifficultyCategory::Master, 28.0),
            test_chart("12", DifficultyCategory::Expert, 24.0),
        ]);
        compute_ranking(&catalog, &ClearStates::from_pairs(pairs.iter().copied()))
    }

    #[test]
    fn empty_ranking_draws_background_and_header_only() {
        let scene = build_scene(&Ranking::default());
        assert_eq!(scene.ops.len(), 4);
        assert!(matches!(
            &scene.ops[0],
            DrawOp::Image { source: ImageSource::Background, .. }
        ));
        let DrawOp::Text(score) = &scene.ops[3] else {
            panic!("expected score text");
        };
        assert_eq!(score.text, "Ranking: 0.00");
        assert_eq!(score.align, HAlign::Right);
        assert!(scene.jacket_ids().is_empty());
    }

    #[test]
    fn each_entry_emits_card_jacket_name_badge_and_indicator() {
        let ranking = ranking_for(&[("1append", "ap")]);
        let scene = build_scene(&ranking);
        assert_eq!(scene.ops.len(), 4 + 7);

        let DrawOp::Text(score) = &scene.ops[3] else {
            panic!("expected score text");
        };
        assert_eq!(score.text, "Ranking: 0.50");

        let DrawOp::Rect { origin, stroke, .. } = &scene.ops[4] else {
            panic!("expected card");
        };
        assert_eq!(*origin, Point::new(30.0, 67.0));
        assert_eq!(stroke.map(|s| s.width), Some(5.0));

        let DrawOp::Image { origin, width, .. } = &scene.ops[5] else {
            panic!("expected jacket");
        };
        assert_eq!(*origin, Point::new(45.0, 82.0));
        assert!((width - JACKET_SIZE).abs() < EPS);

        let DrawOp::Text(name) = &scene.ops[6] else {
            panic!("expected song name");
        };
        assert_eq!(name.text, "Song 1");
        assert!(name.wrap);
        assert!((name.origin.x - (30.0 + 30.0 + JACKET_SIZE)).abs() < EPS);

        let DrawOp::Rect { origin, .. } = &scene.ops[7] else {
            panic!("expected badge");
        };
        assert_eq!(*origin, Point::new(30.0 - 18.5, 67.0 - 11.0));

        let DrawOp::Text(badge_text) = &scene.ops[8] else {
            panic!("expected badge text");
        };
        assert_eq!(badge_text.text, "15.0");

        let DrawOp::Polygon { origin, points, .. } = &scene.ops[9] else {
            panic!("expected indicator");
        };
        assert!((origin.x - (30.0 + CARD_WIDTH - 18.0)).abs() < EPS);
        assert_eq!(points.len(), 8);

        let DrawOp::Text(label) = &scene.ops[10] else {
            panic!("expected indicator label");
        };
        assert_eq!(label.text, "AP");
    }

    #[test]
    fn badge_shows_effective_difficulty_and_jackets_are_deduped() {
        let ranking = ranking_for(&[("1master", "fc"), ("12expert", "ap"), ("1append", "fc")]);
        let scene = build_scene(&ranking);
        let badge_texts: Vec<_> = scene
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text(t) if t.font_size == BADGE_FONT_SIZE => Some(t.text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(badge_texts, vec!["27.0", "24.0", "14.0"]);
        assert_eq!(scene.jacket_ids(), vec!["1".to_string(), "12".to_string()]);
    }
}
