use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::{
    decompress::{Engine, decompress},
    error::{RetropicError, RetropicResult},
};

bitflags::bitflags! {
    /// Which screen planes a draw command touches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Layers: u8 {
        const VISUAL = 1 << 0;
        const PRIORITY = 1 << 1;
        const CONTROL = 1 << 2;
    }
}

/// Plane codes resolved at parse time. The visual code is a dither-pair byte
/// (two 4-bit color indices); priority and control are 4-bit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCodes {
    pub visual: u8,
    pub priority: u8,
    pub control: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Brush shape state captured at the time a pattern command was parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Brush size, 0..=7 (radius in pixels).
    pub size: u8,
    /// Rectangular brush instead of a circle.
    pub rectangular: bool,
    /// Textured spray instead of a solid stamp.
    pub spray: bool,
}

/// One instruction in a picture's replay log.
///
/// Commands are self-contained: pen and palette state is resolved while
/// parsing, so replaying any prefix of the log needs no further context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawCommand {
    Polyline {
        layers: Layers,
        codes: DrawCodes,
        points: Vec<Point>,
    },
    Fill {
        layers: Layers,
        codes: DrawCodes,
        at: Point,
    },
    Brush {
        layers: Layers,
        codes: DrawCodes,
        pattern: Pattern,
        /// Spray texture seed; present only for spray brushes.
        texture: Option<u8>,
        at: Point,
    },
}

/// A decoded picture: the immutable, ordered draw-command log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture {
    commands: Vec<DrawCommand>,
}

impl Picture {
    /// Decode a base64 payload. The (payload, engine, compression) triple
    /// fully determines the command sequence.
    pub fn decode(data: &str, engine: Engine, compression: u8) -> RetropicResult<Self> {
        let raw = BASE64
            .decode(data.trim())
            .map_err(|e| RetropicError::decode(format!("payload is not valid base64: {e}")))?;
        let bytes = decompress(engine, compression, &raw)?;
        Self::parse_from(&bytes)
    }

    /// Parse an already-decompressed picture bitstream.
    pub fn parse_from(bytes: &[u8]) -> RetropicResult<Self> {
        Parser::new(bytes).run()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

const OP_SET_COLOR: u8 = 0xF0;
const OP_DISABLE_VISUAL: u8 = 0xF1;
const OP_SET_PRIORITY: u8 = 0xF2;
const OP_DISABLE_PRIORITY: u8 = 0xF3;
const OP_SHORT_PATTERNS: u8 = 0xF4;
const OP_MEDIUM_LINES: u8 = 0xF5;
const OP_LONG_LINES: u8 = 0xF6;
const OP_SHORT_LINES: u8 = 0xF7;
const OP_FILL: u8 = 0xF8;
const OP_SET_PATTERN: u8 = 0xF9;
const OP_ABSOLUTE_PATTERNS: u8 = 0xFA;
const OP_SET_CONTROL: u8 = 0xFB;
const OP_DISABLE_CONTROL: u8 = 0xFC;
const OP_MEDIUM_PATTERNS: u8 = 0xFD;
const OP_OPX: u8 = 0xFE;
const OP_TERMINATE: u8 = 0xFF;

const OPX_SET_PALETTE_ENTRIES: u8 = 0x00;
const OPX_SET_PALETTE: u8 = 0x01;
const OPX_MONO0: u8 = 0x02;
const OPX_MONO1: u8 = 0x03;
const OPX_MONO2: u8 = 0x04;
const OPX_MONO3: u8 = 0x05;
const OPX_MONO4: u8 = 0x06;
const OPX_EMBEDDED_VIEW: u8 = 0x07;
const OPX_SET_PRIORITY_TABLE: u8 = 0x08;

const PALETTE_SIZE: usize = 40;
const PALETTE_COUNT: usize = 4;

/// Startup contents of each of the four 40-entry dither-pair palettes.
const DEFAULT_PALETTE: [u8; PALETTE_SIZE] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
    0x88, 0x88, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x88, 0x88, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD,
    0xFE, 0xFF, 0x08, 0x91, 0x2A, 0x3B, 0x4C, 0x5D, 0x6E, 0x88,
];

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    palettes: [[u8; PALETTE_SIZE]; PALETTE_COUNT],
    visual: Option<u8>,
    priority: Option<u8>,
    control: Option<u8>,
    pattern: Pattern,
    commands: Vec<DrawCommand>,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            palettes: [DEFAULT_PALETTE; PALETTE_COUNT],
            visual: None,
            priority: None,
            control: None,
            pattern: Pattern {
                size: 0,
                rectangular: false,
                spray: false,
            },
            commands: Vec::new(),
        }
    }

    fn next(&mut self) -> RetropicResult<u8> {
        let Some(&b) = self.data.get(self.pos) else {
            return Err(RetropicError::decode("picture stream ended prematurely"));
        };
        self.pos += 1;
        Ok(b)
    }

    fn skip(&mut self, n: usize) -> RetropicResult<()> {
        if self.pos + n > self.data.len() {
            return Err(RetropicError::decode("picture stream ended prematurely"));
        }
        self.pos += n;
        Ok(())
    }

    /// True while the next byte is operand data rather than a new opcode.
    fn has_operand(&self) -> bool {
        self.data.get(self.pos).is_some_and(|&b| b < 0xF0)
    }

    fn abs_coord(&mut self) -> RetropicResult<Point> {
        let prefix = self.next()?;
        let xl = self.next()?;
        let yl = self.next()?;
        Ok(Point {
            x: (i32::from(prefix & 0xF0) << 4) | i32::from(xl),
            y: (i32::from(prefix & 0x0F) << 8) | i32::from(yl),
        })
    }

    fn short_rel(&mut self, p: Point) -> RetropicResult<Point> {
        let b = self.next()?;
        let dx = i32::from((b >> 4) & 0x7) * if b & 0x80 != 0 { -1 } else { 1 };
        let dy = i32::from(b & 0x7) * if b & 0x08 != 0 { -1 } else { 1 };
        Ok(Point {
            x: p.x + dx,
            y: p.y + dy,
        })
    }

    fn medium_rel(&mut self, p: Point) -> RetropicResult<Point> {
        let by = self.next()?;
        let y = if by & 0x80 != 0 {
            p.y - i32::from(by & 0x7F)
        } else {
            p.y + i32::from(by)
        };
        let bx = self.next()?;
        let x = if bx & 0x80 != 0 {
            p.x - (128 - i32::from(bx & 0x7F))
        } else {
            p.x + i32::from(bx)
        };
        Ok(Point { x, y })
    }

    fn current(&self) -> (Layers, DrawCodes) {
        let mut layers = Layers::empty();
        if self.visual.is_some() {
            layers |= Layers::VISUAL;
        }
        if self.priority.is_some() {
            layers |= Layers::PRIORITY;
        }
        if self.control.is_some() {
            layers |= Layers::CONTROL;
        }
        (
            layers,
            DrawCodes {
                visual: self.visual.unwrap_or(0),
                priority: self.priority.unwrap_or(0),
                control: self.control.unwrap_or(0),
            },
        )
    }

    fn resolve_color(&self, code: u8) -> u8 {
        let pal = (usize::from(code) / PALETTE_SIZE).min(PALETTE_COUNT - 1);
        self.palettes[pal][usize::from(code) % PALETTE_SIZE]
    }

    fn run(mut self) -> RetropicResult<Picture> {
        loop {
            let op = self.next()?;
            match op {
                OP_SET_COLOR => {
                    let code = self.next()?;
                    self.visual = Some(self.resolve_color(code));
                }
                OP_DISABLE_VISUAL => self.visual = None,
                OP_SET_PRIORITY => {
                    let code = self.next()?;
                    self.priority = Some(code & 0x0F);
                }
                OP_DISABLE_PRIORITY => self.priority = None,
                OP_SET_CONTROL => {
                    let code = self.next()?;
                    self.control = Some(code & 0x0F);
                }
                OP_DISABLE_CONTROL => self.control = None,
                OP_SET_PATTERN => {
                    let b = self.next()?;
                    self.pattern = Pattern {
                        size: b & 0x07,
                        rectangular: b & 0x10 != 0,
                        spray: b & 0x20 != 0,
                    };
                }
                OP_LONG_LINES => self.parse_lines(CoordMode::Absolute)?,
                OP_MEDIUM_LINES => self.parse_lines(CoordMode::Medium)?,
                OP_SHORT_LINES => self.parse_lines(CoordMode::Short)?,
                OP_ABSOLUTE_PATTERNS => self.parse_patterns(CoordMode::Absolute)?,
                OP_MEDIUM_PATTERNS => self.parse_patterns(CoordMode::Medium)?,
                OP_SHORT_PATTERNS => self.parse_patterns(CoordMode::Short)?,
                OP_FILL => {
                    let (layers, codes) = self.current();
                    while self.has_operand() {
                        let at = self.abs_coord()?;
                        self.commands.push(DrawCommand::Fill { layers, codes, at });
                    }
                }
                OP_OPX => self.parse_extended()?,
                OP_TERMINATE => break,
                other => {
                    return Err(RetropicError::decode(format!(
                        "unexpected opcode {other:#04x} at offset {}",
                        self.pos - 1
                    )));
                }
            }
        }
        Ok(Picture {
            commands: self.commands,
        })
    }

    fn parse_lines(&mut self, mode: CoordMode) -> RetropicResult<()> {
        let (layers, codes) = self.current();
        let mut points = vec![self.abs_coord()?];
        while self.has_operand() {
            let prev = *points.last().unwrap_or(&Point { x: 0, y: 0 });
            let next = match mode {
                CoordMode::Absolute => self.abs_coord()?,
                CoordMode::Medium => self.medium_rel(prev)?,
                CoordMode::Short => self.short_rel(prev)?,
            };
            points.push(next);
        }
        self.commands.push(DrawCommand::Polyline {
            layers,
            codes,
            points,
        });
        Ok(())
    }

    fn parse_patterns(&mut self, mode: CoordMode) -> RetropicResult<()> {
        let (layers, codes) = self.current();
        let pattern = self.pattern;
        let mut texture = if pattern.spray {
            Some(self.next()? >> 1)
        } else {
            None
        };
        let mut at = self.abs_coord()?;
        self.commands.push(DrawCommand::Brush {
            layers,
            codes,
            pattern,
            texture,
            at,
        });
        while self.has_operand() {
            texture = if pattern.spray {
                Some(self.next()? >> 1)
            } else {
                None
            };
            at = match mode {
                CoordMode::Absolute => self.abs_coord()?,
                CoordMode::Medium => self.medium_rel(at)?,
                CoordMode::Short => self.short_rel(at)?,
            };
            self.commands.push(DrawCommand::Brush {
                layers,
                codes,
                pattern,
                texture,
                at,
            });
        }
        Ok(())
    }

    fn parse_extended(&mut self) -> RetropicResult<()> {
        let opx = self.next()?;
        match opx {
            OPX_SET_PALETTE_ENTRIES => {
                while self.has_operand() {
                    let index = usize::from(self.next()?);
                    let color = self.next()?;
                    if index >= PALETTE_SIZE * PALETTE_COUNT {
                        return Err(RetropicError::decode(format!(
                            "palette entry index {index} out of range"
                        )));
                    }
                    self.palettes[index / PALETTE_SIZE][index % PALETTE_SIZE] = color;
                }
            }
            OPX_SET_PALETTE => {
                let which = usize::from(self.next()?);
                if which >= PALETTE_COUNT {
                    return Err(RetropicError::decode(format!(
                        "palette number {which} out of range"
                    )));
                }
                for i in 0..PALETTE_SIZE {
                    self.palettes[which][i] = self.next()?;
                }
            }
            OPX_MONO0 => self.skip(41)?,
            OPX_MONO1 | OPX_MONO3 => self.skip(1)?,
            OPX_MONO2 | OPX_MONO4 => {}
            OPX_EMBEDDED_VIEW => {
                // Embedded cel bitmaps carry no vector drawing; skip the
                // position and the size-prefixed blob.
                let _at = self.abs_coord()?;
                let lo = self.next()?;
                let hi = self.next()?;
                self.skip(usize::from(u16::from_le_bytes([lo, hi])))?;
            }
            OPX_SET_PRIORITY_TABLE => self.skip(14)?,
            other => {
                return Err(RetropicError::decode(format!(
                    "unexpected extended opcode {other:#04x}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum CoordMode {
    Absolute,
    Medium,
    Short,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(x: u16, y: u16) -> [u8; 3] {
        [
            (((x >> 4) & 0xF0) | ((y >> 8) & 0x0F)) as u8,
            (x & 0xFF) as u8,
            (y & 0xFF) as u8,
        ]
    }

    #[test]
    fn abs_coord_round_trips_12_bit_values() {
        let mut bytes = Vec::new();
        bytes.push(OP_SET_COLOR);
        bytes.push(0);
        bytes.push(OP_LONG_LINES);
        bytes.extend_from_slice(&abs(319, 189));
        bytes.push(OP_TERMINATE);
        let pic = Picture::parse_from(&bytes).unwrap();
        let DrawCommand::Polyline { points, .. } = &pic.commands()[0] else {
            panic!("expected polyline");
        };
        assert_eq!(points[0], Point { x: 319, y: 189 });
    }

    #[test]
    fn set_color_resolves_against_default_palette() {
        let bytes = [OP_SET_COLOR, 0x01, OP_FILL, 0x00, 0x0A, 0x0A, OP_TERMINATE];
        let pic = Picture::parse_from(&bytes).unwrap();
        let DrawCommand::Fill { layers, codes, at } = pic.commands()[0] else {
            panic!("expected fill");
        };
        assert_eq!(layers, Layers::VISUAL);
        assert_eq!(codes.visual, 0x11);
        assert_eq!(at, Point { x: 10, y: 10 });
    }

    #[test]
    fn palette_updates_apply_to_later_commands_only() {
        let mut bytes = Vec::new();
        bytes.push(OP_SET_COLOR);
        bytes.push(0x01);
        bytes.extend_from_slice(&[OP_FILL, 0x00, 0x01, 0x01]);
        // Update entry 1, then set the same code again.
        bytes.extend_from_slice(&[OP_OPX, OPX_SET_PALETTE_ENTRIES, 0x01, 0x4C]);
        bytes.push(OP_SET_COLOR);
        bytes.push(0x01);
        bytes.extend_from_slice(&[OP_FILL, 0x00, 0x02, 0x02]);
        bytes.push(OP_TERMINATE);

        let pic = Picture::parse_from(&bytes).unwrap();
        let DrawCommand::Fill { codes: c0, .. } = pic.commands()[0] else {
            panic!()
        };
        let DrawCommand::Fill { codes: c1, .. } = pic.commands()[1] else {
            panic!()
        };
        assert_eq!(c0.visual, 0x11);
        assert_eq!(c1.visual, 0x4C);
    }

    #[test]
    fn short_lines_decode_signed_nibble_deltas() {
        let mut bytes = Vec::new();
        bytes.push(OP_SET_COLOR);
        bytes.push(0x00);
        bytes.push(OP_SHORT_LINES);
        bytes.extend_from_slice(&abs(100, 100));
        // dx = -3 (0x80 | 0x30), dy = +2.
        bytes.push(0x80 | 0x30 | 0x02);
        bytes.push(OP_TERMINATE);
        let pic = Picture::parse_from(&bytes).unwrap();
        let DrawCommand::Polyline { points, .. } = &pic.commands()[0] else {
            panic!("expected polyline");
        };
        assert_eq!(points[1], Point { x: 97, y: 102 });
    }

    #[test]
    fn medium_lines_decode_sign_magnitude_y() {
        let mut bytes = Vec::new();
        bytes.push(OP_SET_COLOR);
        bytes.push(0x00);
        bytes.push(OP_MEDIUM_LINES);
        bytes.extend_from_slice(&abs(50, 50));
        bytes.push(0x80 | 10); // dy = -10
        bytes.push(5); // dx = +5
        bytes.push(OP_TERMINATE);
        let pic = Picture::parse_from(&bytes).unwrap();
        let DrawCommand::Polyline { points, .. } = &pic.commands()[0] else {
            panic!("expected polyline");
        };
        assert_eq!(points[1], Point { x: 55, y: 40 });
    }

    #[test]
    fn spray_patterns_carry_textures() {
        let mut bytes = Vec::new();
        bytes.push(OP_SET_COLOR);
        bytes.push(0x00);
        bytes.push(OP_SET_PATTERN);
        bytes.push(0x20 | 0x02); // spray, size 2
        bytes.push(OP_ABSOLUTE_PATTERNS);
        bytes.push(0x54); // texture byte, stored >> 1
        bytes.extend_from_slice(&abs(20, 30));
        bytes.push(OP_TERMINATE);
        let pic = Picture::parse_from(&bytes).unwrap();
        let DrawCommand::Brush {
            pattern, texture, ..
        } = pic.commands()[0]
        else {
            panic!("expected brush");
        };
        assert!(pattern.spray);
        assert_eq!(pattern.size, 2);
        assert_eq!(texture, Some(0x2A));
    }

    #[test]
    fn disabled_planes_drop_out_of_the_layer_mask() {
        let bytes = [
            OP_SET_COLOR,
            0x00,
            OP_SET_PRIORITY,
            0x05,
            OP_DISABLE_VISUAL,
            OP_FILL,
            0x00,
            0x01,
            0x01,
            OP_TERMINATE,
        ];
        let pic = Picture::parse_from(&bytes).unwrap();
        let DrawCommand::Fill { layers, codes, .. } = pic.commands()[0] else {
            panic!()
        };
        assert_eq!(layers, Layers::PRIORITY);
        assert_eq!(codes.priority, 5);
    }

    #[test]
    fn missing_terminator_is_a_decode_error() {
        let err = Picture::parse_from(&[OP_SET_COLOR, 0x00]).unwrap_err();
        assert!(err.to_string().contains("ended prematurely"));
    }

    #[test]
    fn unknown_opcode_is_a_decode_error() {
        // 0xF0..0xFF are the only opcode bytes; a stray operand where an
        // opcode belongs must fail fast.
        let err = Picture::parse_from(&[0x12]).unwrap_err();
        assert!(err.to_string().contains("unexpected opcode"));
    }

    #[test]
    fn decode_accepts_base64_and_is_deterministic() {
        let bytes = [OP_SET_COLOR, 0x01, OP_FILL, 0x00, 0x0A, 0x0A, OP_TERMINATE];
        let encoded = {
            use base64::Engine as _;
            base64::engine::general_purpose::STANDARD.encode(bytes)
        };
        let a = Picture::decode(&encoded, Engine::Sci0, 0).unwrap();
        let b = Picture::decode(&encoded, Engine::Sci0, 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }
}
