//! Undoes Xcode's CgBI PNG optimisation so standard decoders accept the icon.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use std::borrow::Cow;
use std::io::{Read, Write};

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const BYTES_PER_PIXEL: usize = 4;
/// Largest width or height accepted for a CgBI image.
const MAX_DIMENSION: u32 = 1 << 14;

fn malformed(msg: impl std::fmt::Display) -> Error {
    Error::MalformedPng(msg.to_string())
}

#[derive(Clone, Copy, Debug)]
struct PngChunk<'a> {
    ty: [u8; 4],
    data: &'a [u8],
}

fn read_chunks(data: &[u8]) -> Result<Vec<PngChunk<'_>>> {
    if !data.starts_with(&SIGNATURE) {
        return Err(malformed("missing PNG signature"));
    }
    let mut chunks = Vec::new();
    let mut offset = SIGNATURE.len();
    while offset < data.len() {
        let mut header = data
            .get(offset..offset + 8)
            .ok_or_else(|| malformed(format!("truncated chunk header at {offset}")))?;
        let len = header.read_u32::<BigEndian>()? as usize;
        let mut ty = [0; 4];
        header.read_exact(&mut ty)?;
        let start = offset + 8;
        let chunk = start
            .checked_add(len)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| {
                malformed(format!(
                    "{} chunk at {offset} declares {len} bytes past the buffer",
                    String::from_utf8_lossy(&ty)
                ))
            })?;
        // data plus the trailing CRC
        offset = start + len + 4;
        if offset > data.len() {
            return Err(malformed(format!(
                "{} chunk is missing its CRC",
                String::from_utf8_lossy(&ty)
            )));
        }
        chunks.push(PngChunk { ty, data: chunk });
        if &ty == b"IEND" {
            break;
        }
    }
    Ok(chunks)
}

fn write_chunk(out: &mut Vec<u8>, ty: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(ty);
    out.extend_from_slice(data);
    let mut crc = crc32fast::Hasher::new();
    crc.update(ty);
    crc.update(data);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
}

#[derive(Clone, Copy, Debug)]
struct Header {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
}

impl Header {
    fn read(mut data: &[u8]) -> Result<Self> {
        if data.len() < 13 {
            return Err(malformed("IHDR shorter than 13 bytes"));
        }
        let width = data.read_u32::<BigEndian>()?;
        let height = data.read_u32::<BigEndian>()?;
        let bit_depth = data.read_u8()?;
        let color_type = data.read_u8()?;
        let _compression = data.read_u8()?;
        let _filter = data.read_u8()?;
        let interlace = data.read_u8()?;
        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            interlace,
        })
    }
}

/// Returns a standard PNG for `data`.
///
/// Input without a `CgBI` chunk is returned as is. Otherwise the raw deflate
/// stream is inflated, the scanlines unfiltered, blue and red swapped back,
/// and everything re-encoded with fresh CRCs and without the `CgBI` chunk.
/// Only 8-bit RGBA images are supported.
pub fn revert_cgbi(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    let chunks = read_chunks(data)?;
    if !chunks.iter().any(|chunk| &chunk.ty == b"CgBI") {
        return Ok(Cow::Borrowed(data));
    }
    let header = chunks
        .iter()
        .find(|chunk| &chunk.ty == b"IHDR")
        .ok_or_else(|| malformed("no IHDR chunk"))
        .and_then(|chunk| Header::read(chunk.data))?;
    if header.bit_depth != 8 || header.color_type != 6 {
        return Err(Error::UnsupportedImageFormat {
            bit_depth: header.bit_depth,
            color_type: header.color_type,
        });
    }
    if header.interlace != 0 {
        return Err(malformed("interlaced CgBI images are not supported"));
    }
    if header.width == 0
        || header.height == 0
        || header.width > MAX_DIMENSION
        || header.height > MAX_DIMENSION
    {
        return Err(malformed(format!(
            "unreasonable dimensions {}x{}",
            header.width, header.height
        )));
    }
    tracing::debug!(
        "reverting CgBI png {}x{}",
        header.width,
        header.height
    );

    let stride = (header.width as usize)
        .checked_mul(BYTES_PER_PIXEL)
        .ok_or_else(|| malformed("image too wide"))?;
    let expected = (stride + 1)
        .checked_mul(header.height as usize)
        .ok_or_else(|| malformed("image too large"))?;
    let compressed = chunks
        .iter()
        .filter(|chunk| &chunk.ty == b"IDAT")
        .flat_map(|chunk| chunk.data.iter().copied())
        .collect::<Vec<_>>();
    let mut scanlines = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(expected as u64)
        .read_to_end(&mut scanlines)
        .map_err(|err| malformed(format!("inflating IDAT: {err}")))?;
    if scanlines.len() != expected {
        return Err(malformed(format!(
            "IDAT holds {} bytes of scanlines, expected {expected}",
            scanlines.len()
        )));
    }

    unfilter(&mut scanlines, stride)?;
    for row in scanlines.chunks_exact_mut(stride + 1) {
        for pixel in row[1..].chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.swap(0, 2);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&scanlines)?;
    let idat = encoder.finish()?;

    let mut out = SIGNATURE.to_vec();
    let mut idat_written = false;
    for chunk in &chunks {
        match &chunk.ty {
            b"CgBI" => {}
            b"IDAT" => {
                if !idat_written {
                    write_chunk(&mut out, b"IDAT", &idat);
                    idat_written = true;
                }
            }
            ty => write_chunk(&mut out, ty, chunk.data),
        }
    }
    Ok(Cow::Owned(out))
}

/// Reverses the per-scanline filters in place, leaving every filter byte `0`.
fn unfilter(scanlines: &mut [u8], stride: usize) -> Result<()> {
    let row_len = stride + 1;
    for y in 0..scanlines.len() / row_len {
        let (done, rest) = scanlines.split_at_mut(y * row_len);
        let prior = y.checked_sub(1).map(|_| &done[done.len() - row_len + 1..]);
        let row = &mut rest[..row_len];
        let filter = row[0];
        row[0] = 0;
        let row = &mut row[1..];
        for x in 0..stride {
            let a = if x >= BYTES_PER_PIXEL { row[x - BYTES_PER_PIXEL] } else { 0 };
            let b = prior.map_or(0, |p| p[x]);
            let c = match prior {
                Some(p) if x >= BYTES_PER_PIXEL => p[x - BYTES_PER_PIXEL],
                _ => 0,
            };
            let predicted = match filter {
                0 => 0,
                1 => a,
                2 => b,
                3 => ((a as u16 + b as u16) / 2) as u8,
                4 => paeth(a, b, c),
                other => return Err(malformed(format!("filter type {other} on row {y}"))),
            };
            row[x] = row[x].wrapping_add(predicted);
        }
    }
    Ok(())
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Decodes an icon bitmap, reverting CgBI first when the data is a PNG.
pub fn decode_icon(data: &[u8]) -> Result<RgbaImage> {
    let bytes = if data.starts_with(&SIGNATURE) {
        revert_cgbi(data)?
    } else {
        Cow::Borrowed(data)
    };
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}
