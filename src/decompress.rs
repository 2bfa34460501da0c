use crate::error::{RetropicError, RetropicResult};

/// Interpreter generation the payload was packed for. The engine selects the
/// method table; the picture opcode grammar itself is shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    Sci0,
    Sci01,
}

/// Expand a resource payload.
///
/// Method tables follow the classic interpreter's resource formats:
/// sci0 = {0 store, 1 LZW, 2 Huffman}, sci01 = {0 store, 1 Huffman, 2 LZW-1}.
/// LZW-1 differs from LZW only in packing code words MSB-first.
pub fn decompress(engine: Engine, method: u8, data: &[u8]) -> RetropicResult<Vec<u8>> {
    match (engine, method) {
        (_, 0) => Ok(data.to_vec()),
        (Engine::Sci0, 1) => unpack_lzw(data, BitOrder::Lsb),
        (Engine::Sci0, 2) => unpack_huffman(data),
        (Engine::Sci01, 1) => unpack_huffman(data),
        (Engine::Sci01, 2) => unpack_lzw(data, BitOrder::Msb),
        (_, m) => Err(RetropicError::decode(format!(
            "unknown compression method {m} for {engine:?}"
        ))),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BitOrder {
    Lsb,
    Msb,
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit: u32,
    order: BitOrder,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8], order: BitOrder) -> Self {
        Self {
            data,
            pos: 0,
            bit: 0,
            order,
        }
    }

    fn read_bit(&mut self) -> RetropicResult<u32> {
        let Some(&byte) = self.data.get(self.pos) else {
            return Err(RetropicError::decode("bitstream ended prematurely"));
        };
        let bit = match self.order {
            BitOrder::Lsb => (byte >> self.bit) & 1,
            BitOrder::Msb => (byte >> (7 - self.bit)) & 1,
        };
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.pos += 1;
        }
        Ok(u32::from(bit))
    }

    fn read(&mut self, n: u32) -> RetropicResult<u32> {
        debug_assert!(n <= 16);
        let mut v = 0u32;
        for i in 0..n {
            let bit = self.read_bit()?;
            match self.order {
                BitOrder::Lsb => v |= bit << i,
                BitOrder::Msb => v = (v << 1) | bit,
            }
        }
        Ok(v)
    }
}

const LZW_RESET: u32 = 0x100;
const LZW_END: u32 = 0x101;
const LZW_FIRST: u32 = 0x102;
const LZW_MAX_BITS: u32 = 12;

fn unpack_lzw(data: &[u8], order: BitOrder) -> RetropicResult<Vec<u8>> {
    let mut reader = BitReader::new(data, order);
    let mut out = Vec::new();

    // Dictionary entries for codes >= LZW_FIRST, as (prefix code, suffix byte).
    let mut dict: Vec<(u32, u8)> = Vec::new();
    let mut bits = 9u32;
    let mut last: Option<u32> = None;

    fn expand(dict: &[(u32, u8)], code: u32, out: &mut Vec<u8>) {
        let start = out.len();
        let mut c = code;
        while c >= LZW_FIRST {
            let (prefix, suffix) = dict[(c - LZW_FIRST) as usize];
            out.push(suffix);
            c = prefix;
        }
        out.push(c as u8);
        out[start..].reverse();
    }

    loop {
        let code = reader.read(bits)?;
        if code == LZW_END {
            break;
        }
        if code == LZW_RESET {
            bits = 9;
            dict.clear();
            last = None;
            continue;
        }

        let next_code = LZW_FIRST + dict.len() as u32;
        let entry_start = out.len();
        if code < 0x100 {
            out.push(code as u8);
        } else if code < next_code {
            expand(&dict, code, &mut out);
        } else if code == next_code {
            // KwKwK: the code being defined right now.
            let Some(prev) = last else {
                return Err(RetropicError::decode("lzw stream starts with a forward reference"));
            };
            expand(&dict, prev, &mut out);
            let first = out[entry_start];
            out.push(first);
        } else {
            return Err(RetropicError::decode(format!(
                "lzw code {code:#x} references an undefined entry"
            )));
        }

        if let Some(prev) = last
            && next_code < (1 << LZW_MAX_BITS)
        {
            dict.push((prev, out[entry_start]));
            if LZW_FIRST + dict.len() as u32 == (1 << bits) - 1 && bits < LZW_MAX_BITS {
                bits += 1;
            }
        }
        last = Some(code);
    }

    Ok(out)
}

fn unpack_huffman(data: &[u8]) -> RetropicResult<Vec<u8>> {
    if data.len() < 2 {
        return Err(RetropicError::decode("huffman payload too short"));
    }
    let node_count = data[0] as usize;
    let terminator = u32::from(data[1]) | 0x100;
    let table_end = 2 + node_count * 2;
    let Some(nodes) = data.get(2..table_end) else {
        return Err(RetropicError::decode("huffman node table is truncated"));
    };
    if nodes.is_empty() {
        return Err(RetropicError::decode("huffman node table is empty"));
    }

    let mut reader = BitReader::new(&data[table_end..], BitOrder::Msb);
    let mut out = Vec::new();
    loop {
        let c = huffman_symbol(nodes, &mut reader)?;
        if c == terminator {
            break;
        }
        out.push((c & 0xFF) as u8);
    }
    Ok(out)
}

/// Walk the node table for one symbol. Values >= 0x100 are escaped literals
/// read directly from the bitstream; the terminator arrives through that path.
fn huffman_symbol(nodes: &[u8], reader: &mut BitReader<'_>) -> RetropicResult<u32> {
    let mut idx = 0usize;
    loop {
        let Some(&siblings) = nodes.get(idx * 2 + 1) else {
            return Err(RetropicError::decode("huffman walk escaped the node table"));
        };
        if siblings == 0 {
            return Ok(u32::from(nodes[idx * 2]));
        }
        let step = if reader.read_bit()? == 1 {
            let right = siblings & 0x0F;
            if right == 0 {
                return Ok(0x100 | reader.read(8)?);
            }
            right
        } else {
            let left = siblings >> 4;
            if left == 0 {
                return Err(RetropicError::decode("huffman node has a dead left branch"));
            }
            left
        };
        idx += step as usize;
    }
}
