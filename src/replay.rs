use crate::{
    palette::PaletteKind,
    pic::{DrawCodes, DrawCommand, Layers, Pattern, Point},
    raster::RasterImage,
};

/// Native picture resolution.
pub const SCREEN_WIDTH: u32 = 320;
pub const SCREEN_HEIGHT: u32 = 190;

const W: usize = SCREEN_WIDTH as usize;
const H: usize = SCREEN_HEIGHT as usize;

/// Untouched background values per plane: the visible plane starts all-white
/// (pair 15:15), priority and control start at zero.
const VISUAL_BACKGROUND: u8 = 0xFF;
const PLANE_BACKGROUND: u8 = 0x00;

/// Replay a prefix of the command log into a raster.
///
/// `limit` clamps to `[0, commands.len()]`. Replaying is deterministic and
/// side-effect-free: the same prefix always produces byte-identical output,
/// and a prefix agrees with any longer replay on every pixel it drew.
///
/// Each visible pixel holds a dither pair (two 4-bit color indices); the
/// returned raster resolves every pair to the smooth blend of its two
/// reference-palette colors, leaving re-quantization to the effect pipeline.
#[tracing::instrument(skip(commands))]
pub fn replay(commands: &[DrawCommand], limit: usize) -> RasterImage {
    let limit = limit.min(commands.len());
    let mut screen = Screen::new();
    for command in &commands[..limit] {
        screen.execute(command);
    }
    screen.resolve_visible()
}

struct Screen {
    visual: Vec<u8>,
    priority: Vec<u8>,
    control: Vec<u8>,
}

impl Screen {
    fn new() -> Self {
        Self {
            visual: vec![VISUAL_BACKGROUND; W * H],
            priority: vec![PLANE_BACKGROUND; W * H],
            control: vec![PLANE_BACKGROUND; W * H],
        }
    }

    fn execute(&mut self, command: &DrawCommand) {
        match command {
            DrawCommand::Polyline {
                layers,
                codes,
                points,
            } => {
                if points.len() == 1 {
                    self.plot(points[0].x, points[0].y, *layers, *codes);
                }
                for seg in points.windows(2) {
                    self.line(seg[0], seg[1], *layers, *codes);
                }
            }
            DrawCommand::Fill { layers, codes, at } => self.fill(*at, *layers, *codes),
            DrawCommand::Brush {
                layers,
                codes,
                pattern,
                texture,
                at,
            } => self.brush(*at, *pattern, *texture, *layers, *codes),
        }
    }

    #[inline]
    fn plot(&mut self, x: i32, y: i32, layers: Layers, codes: DrawCodes) {
        if x < 0 || y < 0 || x >= W as i32 || y >= H as i32 {
            return;
        }
        let i = y as usize * W + x as usize;
        if layers.contains(Layers::VISUAL) {
            self.visual[i] = codes.visual;
        }
        if layers.contains(Layers::PRIORITY) {
            self.priority[i] = codes.priority;
        }
        if layers.contains(Layers::CONTROL) {
            self.control[i] = codes.control;
        }
    }

    fn line(&mut self, a: Point, b: Point, layers: Layers, codes: DrawCodes) {
        let (mut x, mut y) = (a.x, a.y);
        let dx = (b.x - a.x).abs();
        let dy = -(b.y - a.y).abs();
        let sx = if a.x < b.x { 1 } else { -1 };
        let sy = if a.y < b.y { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.plot(x, y, layers, codes);
            if x == b.x && y == b.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn brush(
        &mut self,
        at: Point,
        pattern: Pattern,
        texture: Option<u8>,
        layers: Layers,
        codes: DrawCodes,
    ) {
        let r = i32::from(pattern.size);
        let mut rng = texture.map(SprayRng::new);
        for dy in -r..=r {
            for dx in -r..=r {
                if !pattern.rectangular && dx * dx + dy * dy > r * r + 1 {
                    continue;
                }
                // The spray decision is consumed for every cell in the brush
                // footprint, in scan order, so a brush stamp is a pure
                // function of its texture code.
                let keep = match rng.as_mut() {
                    Some(rng) => rng.coin(),
                    None => true,
                };
                if keep {
                    self.plot(at.x + dx, at.y + dy, layers, codes);
                }
            }
        }
    }

    fn fill(&mut self, at: Point, layers: Layers, codes: DrawCodes) {
        if at.x < 0 || at.y < 0 || at.x >= W as i32 || at.y >= H as i32 {
            return;
        }
        // Legality is decided on a single test plane (visible wins over
        // priority over control); the fill writes to every enabled plane.
        let (target, write) = if layers.contains(Layers::VISUAL) {
            (VISUAL_BACKGROUND, codes.visual)
        } else if layers.contains(Layers::PRIORITY) {
            (PLANE_BACKGROUND, codes.priority)
        } else if layers.contains(Layers::CONTROL) {
            (PLANE_BACKGROUND, codes.control)
        } else {
            return;
        };
        // Filling the background with itself would never terminate.
        if write == target {
            return;
        }

        let test_plane = |s: &Self, i: usize| -> u8 {
            if layers.contains(Layers::VISUAL) {
                s.visual[i]
            } else if layers.contains(Layers::PRIORITY) {
                s.priority[i]
            } else {
                s.control[i]
            }
        };

        let start = at.y as usize * W + at.x as usize;
        if test_plane(self, start) != target {
            return;
        }

        let mut stack = vec![(at.x as usize, at.y as usize)];
        while let Some((x, y)) = stack.pop() {
            // Walk to the left edge of this run.
            let mut x0 = x;
            while x0 > 0 && test_plane(self, y * W + x0 - 1) == target {
                x0 -= 1;
            }
            let mut span_above = false;
            let mut span_below = false;
            let mut cx = x0;
            while cx < W && test_plane(self, y * W + cx) == target {
                let i = y * W + cx;
                if layers.contains(Layers::VISUAL) {
                    self.visual[i] = codes.visual;
                }
                if layers.contains(Layers::PRIORITY) {
                    self.priority[i] = codes.priority;
                }
                if layers.contains(Layers::CONTROL) {
                    self.control[i] = codes.control;
                }
                if y > 0 {
                    let above = test_plane(self, (y - 1) * W + cx) == target;
                    if above && !span_above {
                        stack.push((cx, y - 1));
                        span_above = true;
                    } else if !above {
                        span_above = false;
                    }
                }
                if y + 1 < H {
                    let below = test_plane(self, (y + 1) * W + cx) == target;
                    if below && !span_below {
                        stack.push((cx, y + 1));
                        span_below = true;
                    } else if !below {
                        span_below = false;
                    }
                }
                cx += 1;
            }
        }
    }

    fn resolve_visible(&self) -> RasterImage {
        let reference = PaletteKind::Cga.table();
        let mut out = RasterImage::filled(SCREEN_WIDTH, SCREEN_HEIGHT, [0, 0, 0, 255]);
        for y in 0..H {
            for x in 0..W {
                let pair = self.visual[y * W + x];
                let a = reference.get(usize::from(pair >> 4));
                let b = reference.get(usize::from(pair & 0x0F));
                out.put(x as u32, y as u32, a.average(b).to_array());
            }
        }
        out
    }
}

/// Deterministic spray texture source (splitmix64 over the texture code).
struct SprayRng(u64);

impl SprayRng {
    fn new(texture: u8) -> Self {
        Self(0x9E37_79B9_7F4A_7C15 ^ u64::from(texture))
    }

    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn coin(&mut self) -> bool {
        self.next() & 1 == 0
    }
}
