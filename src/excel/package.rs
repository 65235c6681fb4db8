//! In-place .xlsx package patching
//!
//! Every part of the template is copied through byte for byte except the
//! worksheets that received values. In those, only the `<c>` elements at
//! written coordinates are replaced or inserted; styles, merges, column
//! widths, drawings and every other part stay as the template had them.

use crate::error::{BsaError, BsaResult};
use crate::types::CellAnchor;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = "[Content_Types].xml";
const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const CALC_CHAIN: &str = "xl/calcChain.xml";

/// Workbook children that must come after `<calcPr>`
const AFTER_CALC_PR: [&[u8]; 9] = [
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

/// Numeric writes for one sheet, keyed by zero-based (row, col)
pub type SheetEdits = BTreeMap<(u32, u16), f64>;

/// Rewrite a template package with numeric cells overwritten.
///
/// The calculation chain is dropped and the workbook is flagged for a full
/// recalculation on open, so formulas over the written cells refresh.
pub fn patch_package(package: &[u8], edits: &[(&str, &SheetEdits)]) -> BsaResult<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let parts = sheet_parts(&mut archive)?;

    let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
    for (sheet, cells) in edits {
        if cells.is_empty() {
            continue;
        }
        let part = parts
            .get(*sheet)
            .ok_or_else(|| BsaError::Save(format!("no worksheet part for sheet '{sheet}'")))?;
        let xml = read_part(&mut archive, part)?;
        replacements.insert(part.clone(), patch_sheet(&xml, cells)?);
    }

    let workbook = read_part(&mut archive, WORKBOOK)?;
    replacements.insert(WORKBOOK.to_string(), force_full_calc(&workbook)?);

    if archive.by_name(CALC_CHAIN).is_ok() {
        let types = read_part(&mut archive, CONTENT_TYPES)?;
        replacements.insert(
            CONTENT_TYPES.to_string(),
            drop_elements(&types, |e| {
                Ok(e.local_name().as_ref() == b"Override"
                    && attribute(e, b"PartName")?.as_deref() == Some("/xl/calcChain.xml"))
            })?,
        );
        let rels = read_part(&mut archive, WORKBOOK_RELS)?;
        replacements.insert(
            WORKBOOK_RELS.to_string(),
            drop_elements(&rels, |e| {
                Ok(e.local_name().as_ref() == b"Relationship"
                    && attribute(e, b"Type")?.is_some_and(|t| t.ends_with("/calcChain")))
            })?,
        );
    }

    let mut out = ZipWriter::new(Cursor::new(Vec::with_capacity(package.len())));
    for index in 0..archive.len() {
        let name = archive.by_index_raw(index)?.name().to_string();
        if name == CALC_CHAIN {
            continue;
        }
        match replacements.remove(&name) {
            Some(bytes) => {
                out.start_file(name, SimpleFileOptions::default())?;
                out.write_all(&bytes)?;
            }
            None => out.raw_copy_file(archive.by_index_raw(index)?)?,
        }
    }

    Ok(out.finish()?.into_inner())
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> BsaResult<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| BsaError::Save(format!("template package has no {name}")))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Sheet name to worksheet part path, via workbook.xml and its relationships
fn sheet_parts<R: Read + Seek>(archive: &mut ZipArchive<R>) -> BsaResult<HashMap<String, String>> {
    let rels = read_part(archive, WORKBOOK_RELS)?;
    let mut targets = HashMap::new();
    each_element(&rels, |e| {
        if e.local_name().as_ref() == b"Relationship" {
            if let (Some(id), Some(target)) = (attribute(e, b"Id")?, attribute(e, b"Target")?) {
                let path = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{target}"),
                };
                targets.insert(id, path);
            }
        }
        Ok(())
    })?;

    let workbook = read_part(archive, WORKBOOK)?;
    let mut parts = HashMap::new();
    each_element(&workbook, |e| {
        if e.local_name().as_ref() == b"sheet" {
            if let (Some(name), Some(id)) = (attribute(e, b"name")?, attribute(e, b"r:id")?) {
                if let Some(path) = targets.get(&id) {
                    parts.insert(name, path.clone());
                }
            }
        }
        Ok(())
    })?;

    Ok(parts)
}

/// Unescaped value of an attribute, matched on its qualified name
fn attribute(e: &BytesStart, key: &[u8]) -> BsaResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Visit every start or empty element
fn each_element<F>(xml: &[u8], mut visit: F) -> BsaResult<()>
where
    F: FnMut(&BytesStart) -> BsaResult<()>,
{
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => visit(&e)?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// Copy `xml`, leaving out elements (and their content) that match
fn drop_elements<F>(xml: &[u8], is_dropped: F) -> BsaResult<Vec<u8>>
where
    F: Fn(&BytesStart) -> BsaResult<bool>,
{
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
        } else {
            match event {
                Event::Eof => break,
                Event::Empty(ref e) if is_dropped(e)? => {}
                Event::Start(ref e) if is_dropped(e)? => skip_depth = 1,
                other => writer.write_event(other)?,
            }
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Set `fullCalcOnLoad="1"` on `<calcPr>`, adding the element if absent
fn force_full_calc(xml: &[u8]) -> BsaResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 32));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut done = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let child_of_workbook = match &event {
            Event::Start(e) | Event::Empty(e) if depth == 1 => Some(e.local_name().as_ref().to_vec()),
            _ => None,
        };

        if !done {
            if let Some(name) = &child_of_workbook {
                if name.as_slice() == b"calcPr" {
                    if let Event::Start(e) | Event::Empty(e) = &event {
                        writer.write_event(Event::Empty(full_calc_pr(Some(e))?))?;
                    }
                    done = true;
                    // calcPr takes no children, so only its end tag follows
                    if matches!(event, Event::Start(_)) {
                        skip_to_end(&mut reader)?;
                    }
                    buf.clear();
                    continue;
                }
                if AFTER_CALC_PR.contains(&name.as_slice()) {
                    writer.write_event(Event::Empty(full_calc_pr(None)?))?;
                    done = true;
                }
            } else if depth == 1 && matches!(event, Event::End(_)) {
                writer.write_event(Event::Empty(full_calc_pr(None)?))?;
                done = true;
            }
        }

        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
        writer.write_event(event)?;
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn full_calc_pr(existing: Option<&BytesStart>) -> BsaResult<BytesStart<'static>> {
    let mut calc = match existing {
        Some(e) => {
            let mut calc = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            for attr in e.attributes() {
                let attr = attr.map_err(quick_xml::Error::from)?;
                if attr.key.as_ref() != b"fullCalcOnLoad" {
                    calc.push_attribute(attr);
                }
            }
            calc
        }
        None => BytesStart::new("calcPr"),
    };
    calc.push_attribute(("fullCalcOnLoad", "1"));
    Ok(calc)
}

/// Consume events through the end tag of the element just opened
fn skip_to_end(reader: &mut Reader<&[u8]>) -> BsaResult<()> {
    let mut buf = Vec::new();
    let mut depth = 1usize;
    while depth > 0 {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// Rewrite one worksheet's XML with numeric cells placed.
///
/// Existing cells at written coordinates keep their style index and lose
/// their type, formula and old value. Missing rows and cells are inserted in
/// sheet order.
fn patch_sheet(xml: &[u8], edits: &SheetEdits) -> BsaResult<Vec<u8>> {
    let mut rows: BTreeMap<u32, BTreeMap<u16, f64>> = BTreeMap::new();
    for (&(row, col), &value) in edits {
        rows.entry(row).or_default().insert(col, value);
    }

    let mut reader = Reader::from_reader(xml);
    let mut patch = SheetPatch {
        writer: Writer::new(Vec::with_capacity(xml.len() + edits.len() * 32)),
        rows,
        current: None,
        row: 0,
        next_row: 0,
        next_col: 0,
    };
    let mut buf = Vec::new();
    let mut in_sheet_data = false;
    let mut skipping_cell = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if skipping_cell {
            if let Event::End(e) = &event {
                skipping_cell = e.local_name().as_ref() != b"c";
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                patch.writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                if patch.rows.is_empty() {
                    patch.writer.write_event(Event::Empty(e))?;
                } else {
                    patch.writer.write_event(Event::Start(e.borrow()))?;
                    patch.flush_rows(None)?;
                    patch.writer.write_event(Event::End(e.to_end()))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                patch.flush_rows(None)?;
                in_sheet_data = false;
                patch.writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                patch.open_row(&e, false)?;
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                patch.open_row(&e, true)?;
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                patch.close_row(e)?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                skipping_cell = patch.cell(&e, false)?;
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                patch.cell(&e, true)?;
            }
            other => patch.writer.write_event(other)?,
        }
        buf.clear();
    }

    if !patch.rows.is_empty() {
        return Err(BsaError::Save("worksheet has no <sheetData> to write into".to_string()));
    }
    Ok(patch.writer.into_inner())
}

struct SheetPatch {
    writer: Writer<Vec<u8>>,
    /// Edits for rows not reached yet
    rows: BTreeMap<u32, BTreeMap<u16, f64>>,
    /// Edits still to place in the row being copied
    current: Option<BTreeMap<u16, f64>>,
    row: u32,
    next_row: u32,
    next_col: u16,
}

impl SheetPatch {
    fn open_row(&mut self, e: &BytesStart, empty: bool) -> BsaResult<()> {
        let row = match attribute(e, b"r")? {
            Some(r) => r
                .parse::<u32>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| BsaError::Save(format!("bad row number '{r}' in worksheet")))?,
            None => self.next_row,
        };
        self.row = row;
        self.next_row = row.saturating_add(1);
        self.next_col = 0;
        self.flush_rows(Some(row))?;

        let Some(cells) = self.rows.remove(&row) else {
            self.current = None;
            let event = if empty {
                Event::Empty(e.borrow())
            } else {
                Event::Start(e.borrow())
            };
            self.writer.write_event(event)?;
            return Ok(());
        };

        // Cell spans are a hint that inserted cells can invalidate
        let mut start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            if attr.key.as_ref() != b"spans" {
                start.push_attribute(attr);
            }
        }

        self.writer.write_event(Event::Start(start.borrow()))?;
        if empty {
            self.write_cells(row, cells)?;
            self.writer.write_event(Event::End(start.to_end()))?;
        } else {
            self.current = Some(cells);
        }
        Ok(())
    }

    fn close_row(&mut self, end: BytesEnd) -> BsaResult<()> {
        if let Some(cells) = self.current.take() {
            self.write_cells(self.row, cells)?;
        }
        self.writer.write_event(Event::End(end))?;
        Ok(())
    }

    /// Copy or replace a cell; true when the original's content must be skipped
    fn cell(&mut self, e: &BytesStart, empty: bool) -> BsaResult<bool> {
        let col = match attribute(e, b"r")? {
            Some(r) => crate::parser::parse_a1(&r)
                .map_err(|_| BsaError::Save(format!("bad cell reference '{r}' in worksheet")))?
                .col,
            None => self.next_col,
        };
        self.next_col = col.saturating_add(1);

        let Some(cells) = self.current.as_mut() else {
            self.copy_cell(e, empty)?;
            return Ok(false);
        };

        let later = cells.split_off(&col);
        let earlier = std::mem::replace(cells, later);
        let replaced = cells.remove(&col);
        self.write_cells(self.row, earlier)?;

        match replaced {
            Some(value) => {
                let style = attribute(e, b"s")?;
                self.write_cell(self.row, col, value, style.as_deref())?;
                Ok(!empty)
            }
            None => {
                self.copy_cell(e, empty)?;
                Ok(false)
            }
        }
    }

    fn copy_cell(&mut self, e: &BytesStart, empty: bool) -> BsaResult<()> {
        let event = if empty {
            Event::Empty(e.borrow())
        } else {
            Event::Start(e.borrow())
        };
        self.writer.write_event(event)?;
        Ok(())
    }

    /// Write pending rows that sort before `limit` (all of them for `None`)
    fn flush_rows(&mut self, limit: Option<u32>) -> BsaResult<()> {
        while let Some(entry) = self.rows.first_entry() {
            if limit.is_some_and(|limit| *entry.key() >= limit) {
                break;
            }
            let (row, cells) = entry.remove_entry();
            let number = (u64::from(row) + 1).to_string();
            let mut start = BytesStart::new("row");
            start.push_attribute(("r", number.as_str()));
            self.writer.write_event(Event::Start(start.borrow()))?;
            self.write_cells(row, cells)?;
            self.writer.write_event(Event::End(start.to_end()))?;
        }
        Ok(())
    }

    fn write_cells(&mut self, row: u32, cells: BTreeMap<u16, f64>) -> BsaResult<()> {
        for (col, value) in cells {
            self.write_cell(row, col, value, None)?;
        }
        Ok(())
    }

    fn write_cell(&mut self, row: u32, col: u16, value: f64, style: Option<&str>) -> BsaResult<()> {
        let reference = CellAnchor::new(row, col).to_a1();
        let mut cell = BytesStart::new("c");
        cell.push_attribute(("r", reference.as_str()));
        if let Some(style) = style {
            cell.push_attribute(("s", style));
        }
        let text = value.to_string();

        self.writer.write_event(Event::Start(cell.borrow()))?;
        self.writer.write_event(Event::Start(BytesStart::new("v")))?;
        self.writer.write_event(Event::Text(BytesText::new(&text)))?;
        self.writer.write_event(Event::End(BytesEnd::new("v")))?;
        self.writer.write_event(Event::End(cell.to_end()))?;
        Ok(())
    }
}
