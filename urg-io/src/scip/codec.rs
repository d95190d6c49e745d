//! SCIP character encoding
//!
//! Numeric values travel as big-endian groups of 6-bit digits, each digit
//! offset by `0x30` so it lands in printable ASCII. Distances use 2 or 3
//! characters, timestamps 4. Every reply line after the echo ends with a
//! one-character checksum.

/// Offset added to every 6-bit digit
const DIGIT_OFFSET: u8 = 0x30;
/// Widest value that fits a `u32` (5 × 6 bits)
pub const MAX_BLOCK_SIZE: usize = 5;

/// Decode one `block_size`-character value starting at `offset`.
///
/// Returns `None` if the text is too short, a character sits below the
/// digit offset, or `block_size` is outside `1..=MAX_BLOCK_SIZE`.
pub fn decode_6bit(text: &[u8], block_size: usize, offset: usize) -> Option<u32> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return None;
    }
    let block = text.get(offset..offset.checked_add(block_size)?)?;
    let mut value: u32 = 0;
    for (i, &c) in block.iter().enumerate() {
        let digit = c.checked_sub(DIGIT_OFFSET)? as u32;
        value += digit << (6 * (block_size - 1 - i));
    }
    Some(value)
}

/// Encode `value` as `block_size` 6-bit characters (inverse of [`decode_6bit`]).
pub fn encode_6bit(value: u32, block_size: usize) -> String {
    (0..block_size)
        .map(|i| {
            let shift = 6 * (block_size - 1 - i);
            ((value.checked_shr(shift as u32).unwrap_or(0) & 0x3F) as u8 + DIGIT_OFFSET) as char
        })
        .collect()
}

/// SCIP checksum: low 6 bits of the byte sum, offset into ASCII.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u32, |acc, &b| acc + b as u32);
    (sum & 0x3F) as u8 + DIGIT_OFFSET
}

/// Check a line whose last character is its checksum.
///
/// Lines of fewer than two characters carry no checksum and pass.
pub fn verify_checksum(line: &str) -> crate::Result<()> {
    verify_line(line, false)
}

/// Check a `KEY:value;` info line; the closing `;` is not covered by its checksum.
pub fn verify_field_checksum(line: &str) -> crate::Result<()> {
    verify_line(line, true)
}

fn verify_line(line: &str, field: bool) -> crate::Result<()> {
    let bytes = line.as_bytes();
    if bytes.len() < 2 {
        return Ok(());
    }
    let (mut data, sum) = bytes.split_at(bytes.len() - 1);
    if field {
        data = data.strip_suffix(b";").unwrap_or(data);
    }
    let expected = checksum(data);
    if expected == sum[0] {
        Ok(())
    } else {
        Err(crate::Error::Checksum {
            expected: expected as char,
            actual: sum[0] as char,
        })
    }
}

/// Append the checksum character to a line body.
pub fn with_checksum(body: &str) -> String {
    let mut line = String::with_capacity(body.len() + 1);
    line.push_str(body);
    line.push(checksum(body.as_bytes()) as char);
    line
}

/// Concatenate data lines from `start_line`, dropping each line's checksum.
fn join_payload(lines: &[String], start_line: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(lines.len().saturating_sub(start_line) * 64);
    for line in lines.iter().skip(start_line) {
        let bytes = line.as_bytes();
        if let Some((_, data)) = bytes.split_last() {
            payload.extend_from_slice(data);
        }
    }
    payload
}

/// Decode a block of samples spread over `lines[start_line..]`.
///
/// Missing lines give an empty result; a trailing partial block is ignored.
pub fn decode_scan_block(lines: &[String], start_line: usize, block_size: usize) -> Vec<u32> {
    if block_size == 0 || lines.len() <= start_line {
        return Vec::new();
    }
    let payload = join_payload(lines, start_line);
    let mut values = Vec::with_capacity(payload.len() / block_size);
    for chunk in payload.chunks_exact(block_size) {
        match decode_6bit(chunk, block_size, 0) {
            Some(v) => values.push(v),
            None => return Vec::new(),
        }
    }
    values
}

/// Decode alternating distance/strength samples (`GE`/`ME` replies).
pub fn decode_scan_with_strength(
    lines: &[String],
    start_line: usize,
    block_size: usize,
) -> (Vec<u32>, Vec<u32>) {
    let pairs = decode_scan_block(lines, start_line, block_size);
    let mut distances = Vec::with_capacity(pairs.len() / 2);
    let mut strengths = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks_exact(2) {
        distances.push(pair[0]);
        strengths.push(pair[1]);
    }
    (distances, strengths)
}

/// Split an encoded payload into checksummed data lines of at most 64 characters.
pub fn encode_data_lines(payload: &str) -> Vec<String> {
    payload
        .as_bytes()
        .chunks(64)
        .map(|chunk| with_checksum(&String::from_utf8_lossy(chunk)))
        .collect()
}
