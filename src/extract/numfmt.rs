// src/extract/numfmt.rs

use crate::error::{PipelineError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Format codes behind the built-in digit formats Excel does not spell out in `styles.xml`.
fn builtin_code(id: &str) -> Option<&'static str> {
    match id {
        "1" => Some("0"),
        "2" => Some("0.00"),
        "3" => Some("#,##0"),
        "4" => Some("#,##0.00"),
        _ => None,
    }
}

/// Number format code of every cell in `sheet` that carries one, keyed by absolute (row, column).
///
/// calamine hands back the raw value of a numeric cell; a code like `00` or
/// `000-0000` is what makes the sheet show `01` or `600-0001`.
pub fn cell_number_formats(bytes: &[u8], sheet: &str) -> Result<HashMap<(usize, usize), String>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| PipelineError::parse("xlsx archive", e))?;

    let styles = match read_part(&mut archive, "xl/styles.xml")? {
        Some(xml) => style_codes(&xml)?,
        None => return Ok(HashMap::new()),
    };
    if styles.iter().all(Option::is_none) {
        return Ok(HashMap::new());
    }
    let Some(part) = sheet_part(&mut archive, sheet)? else {
        return Ok(HashMap::new());
    };
    let Some(xml) = read_part(&mut archive, &part)? else {
        return Ok(HashMap::new());
    };

    let mut out = HashMap::new();
    let mut reader = Reader::from_str(&xml);
    loop {
        match reader.read_event().map_err(|e| PipelineError::parse(&part, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                // cells without an `r` reference are left raw
                let (Some(r), Some(s)) = (attr(&e, b"r")?, attr(&e, b"s")?) else {
                    continue;
                };
                let code = s
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| styles.get(i))
                    .and_then(Option::as_ref);
                if let (Some(code), Some(pos)) = (code, parse_cell_ref(&r)) {
                    out.insert(pos, code.clone());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    debug!(part = %part, cells = out.len(), "read number formats");
    Ok(out)
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(PipelineError::parse(name, e)),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| PipelineError::parse(name, e))?;
    Ok(Some(xml))
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| PipelineError::parse("xlsx attribute", err))?;
        if a.key.local_name().as_ref() == name {
            let value = a
                .unescape_value()
                .map_err(|err| PipelineError::parse("xlsx attribute", err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Format code per `cellXfs` entry, in style-index order. `None` for formats left to calamine.
fn style_codes(xml: &str) -> Result<Vec<Option<String>>> {
    let mut custom: HashMap<String, String> = HashMap::new();
    let mut xf_ids = Vec::new();
    let mut in_cell_xfs = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader
            .read_event()
            .map_err(|e| PipelineError::parse("xl/styles.xml", e))?
        {
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    if let (Some(id), Some(code)) = (attr(&e, b"numFmtId")?, attr(&e, b"formatCode")?) {
                        custom.insert(id, code);
                    }
                }
                b"xf" if in_cell_xfs => {
                    xf_ids.push(attr(&e, b"numFmtId")?.unwrap_or_else(|| "0".to_string()));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(xf_ids
        .iter()
        .map(|id| {
            custom
                .get(id)
                .cloned()
                .or_else(|| builtin_code(id).map(str::to_string))
        })
        .collect())
}

/// Archive path of the worksheet named `sheet`, via `workbook.xml` and its relationships.
fn sheet_part(archive: &mut Archive<'_>, sheet: &str) -> Result<Option<String>> {
    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Ok(None);
    };
    let Some(rel_id) = find_attr(&workbook, b"sheet", (b"name", sheet), b"id")? else {
        return Ok(None);
    };
    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(None);
    };
    let target = find_attr(&rels, b"Relationship", (b"Id", &rel_id), b"Target")?;
    Ok(target.map(|t| match t.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", t),
    }))
}

/// Value of `wanted` on the first `element` whose `key` attribute equals the given value.
fn find_attr(
    xml: &str,
    element: &[u8],
    (key, value): (&[u8], &str),
    wanted: &[u8],
) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader
            .read_event()
            .map_err(|e| PipelineError::parse("xlsx workbook", e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == element => {
                if attr(&e, key)?.as_deref() == Some(value) {
                    return attr(&e, wanted);
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// `B12` → (11, 1).
fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let col = letters.bytes().try_fold(0usize, |acc, b| {
        b.is_ascii_uppercase()
            .then(|| acc * 26 + (b - b'A' + 1) as usize)
    })?;
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// Render `value` as Excel displays it under `code`.
///
/// Only digit formats are handled: `0`/`#` placeholders with optional grouping and
/// decimals, or integer templates with literal separators such as `000-0000`.
/// Any other format yields `None`.
pub fn render_number(value: f64, code: &str) -> Option<String> {
    let section = code.split(';').next().unwrap_or(code);
    if section.is_empty() || !section.contains(['0', '#']) {
        return None;
    }
    if section.chars().all(|c| matches!(c, '0' | '#' | ',' | '.')) {
        render_decimal(value, section)
    } else {
        render_template(value, section)
    }
}

fn render_decimal(value: f64, section: &str) -> Option<String> {
    let (int_fmt, frac_fmt) = section.split_once('.').unwrap_or((section, ""));
    if frac_fmt.contains(['.', ',']) || int_fmt.ends_with(',') {
        return None;
    }
    let min_int = int_fmt.chars().filter(|&c| c == '0').count();
    let min_frac = frac_fmt.chars().take_while(|&c| c == '0').count();

    let fixed = format!("{:.*}", frac_fmt.len(), value.abs());
    let (int_digits, frac_digits) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let mut frac = frac_digits.to_string();
    while frac.len() > min_frac && frac.ends_with('0') {
        frac.pop();
    }
    let mut int = format!("{:0>width$}", int_digits.trim_start_matches('0'), width = min_int);
    if int_fmt.contains(',') {
        int = group_thousands(&int);
    }

    let mut out = String::new();
    if value < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        out.push('-');
    }
    out.push_str(&int);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }
    Some(out)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

enum Piece {
    Digit { required: bool },
    Literal(char),
}

fn render_template(value: f64, section: &str) -> Option<String> {
    if value < 0.0 || value.fract() != 0.0 || value >= 1e15 {
        return None;
    }

    let mut pieces = Vec::new();
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        match c {
            '0' => pieces.push(Piece::Digit { required: true }),
            '#' => pieces.push(Piece::Digit { required: false }),
            '\\' => pieces.push(Piece::Literal(chars.next()?)),
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                    pieces.push(Piece::Literal(q));
                }
            }
            '-' | ' ' | '/' | '(' | ')' | ':' => pieces.push(Piece::Literal(c)),
            _ => return None,
        }
    }

    let slots = pieces
        .iter()
        .filter(|p| matches!(p, Piece::Digit { .. }))
        .count();
    let whole = format!("{}", value as u64);
    let mut digits: Vec<char> = whole.trim_start_matches('0').chars().collect();

    // filled right to left; surplus digits go in front of the leftmost placeholder
    let mut out = Vec::new();
    let mut seen = 0;
    for piece in pieces.iter().rev() {
        match *piece {
            Piece::Literal(c) => out.push(c),
            Piece::Digit { required } => {
                seen += 1;
                match digits.pop() {
                    Some(d) => out.push(d),
                    None if required => out.push('0'),
                    None => {}
                }
                if seen == slots {
                    while let Some(d) = digits.pop() {
                        out.push(d);
                    }
                }
            }
        }
    }
    Some(out.into_iter().rev().collect())
}
