//! SAM text emission: the tab-separated line format used by downstream
//! tools and test harnesses. Not the hard part of this crate, but the exact
//! byte-for-byte format callers expect.

use std::io::Write;

use crate::error::Result;
use crate::record::{AlignmentRecord, TagValue};

/// Writes one record as a tab-separated SAM line (no trailing newline).
pub fn write_record<W: Write>(record: &AlignmentRecord, ref_names: &[impl AsRef<str>], out: &mut W) -> Result<()> {
    let rname = ref_name(record.ref_id, ref_names);
    let rnext = if record.next_ref_id == -1 {
        "*".to_string()
    } else if record.next_ref_id == record.ref_id {
        "=".to_string()
    } else {
        ref_name(record.next_ref_id, ref_names).to_string()
    };

    write!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.name,
        record.flag,
        rname,
        record.position + 1,
        record.mapq,
        format_cigar(record),
        rnext,
        record.next_pos + 1,
        record.template_length,
        format_seq(record),
        format_qual(record),
    )?;

    for (key, value) in &record.tags {
        write!(out, "\t{}{}:{}", key[0] as char, key[1] as char, format_tag_value(value))?;
    }

    Ok(())
}

fn ref_name<'a>(ref_id: i32, ref_names: &'a [impl AsRef<str>]) -> &'a str {
    if ref_id < 0 {
        "*"
    } else {
        ref_names.get(ref_id as usize).map(|s| s.as_ref()).unwrap_or("*")
    }
}

fn format_cigar(record: &AlignmentRecord) -> String {
    if record.cigar.is_empty() {
        return "*".to_string();
    }
    let mut s = String::new();
    for element in &record.cigar {
        s.push_str(&element.len.to_string());
        s.push(element.op.as_char());
    }
    s
}

fn format_seq(record: &AlignmentRecord) -> String {
    if record.seq_len == 0 {
        "*".to_string()
    } else {
        record.sequence_string()
    }
}

fn format_qual(record: &AlignmentRecord) -> String {
    if record.qualities_missing() {
        return "*".to_string();
    }
    record.qualities.iter().map(|&q| (q + 33) as char).collect()
}

fn format_tag_value(value: &TagValue) -> String {
    match value {
        TagValue::Text(s) => format!("Z:{s}"),
        TagValue::Hex(s) => format!("H:{s}"),
        TagValue::Char(c) => format!("A:{}", *c as char),
        TagValue::Int(v) => format!("i:{v}"),
        TagValue::Float(v) => format!("f:{}", format_g(*v)),
        TagValue::IntArray { elem_type, values } => {
            let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            format!("B:{},{}", *elem_type as char, rendered.join(","))
        }
        TagValue::FloatArray(values) => {
            let rendered: Vec<String> = values.iter().map(|v| format_g(*v)).collect();
            format!("B:f,{}", rendered.join(","))
        }
    }
}

/// Minimal reimplementation of C's `%g`: shortest round-tripping decimal
/// representation, trimming trailing zeros and a trailing decimal point.
fn format_g(value: f32) -> String {
    if value == value.trunc() && value.abs() < 1e6 {
        return format!("{}", value as i64);
    }

    let mut s = format!("{value}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CigarElement;
    use crate::record::CigarOp;

    fn base_record() -> AlignmentRecord {
        AlignmentRecord {
            ref_id: 0, position: 99, flag: 0, mapq: 60,
            cigar: vec![CigarElement { len: 10, op: CigarOp::Match }],
            next_ref_id: -1, next_pos: -1, template_length: 0,
            packed_sequence: vec![], seq_len: 0,
            qualities: vec![], name: "read1".into(), tags: vec![],
            start_vo: None, end_vo: None,
        }
    }

    #[test]
    fn renders_unmapped_mate_as_star() {
        let record = base_record();
        let names = vec!["chr1".to_string()];
        let mut out = Vec::new();
        write_record(&record, &names, &mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        let fields: Vec<_> = line.split('\t').collect();
        assert_eq!(fields[6], "*"); // RNEXT
    }

    #[test]
    fn float_tag_renders_with_g_format() {
        assert_eq!(format_tag_value(&TagValue::Float(2.7)), "f:2.7");
    }

    #[test]
    fn int_array_tag_renders_with_original_elem_type() {
        let value = TagValue::IntArray { elem_type: b'i', values: vec![1, 2, 3] };
        assert_eq!(format_tag_value(&value), "B:i,1,2,3");
    }

    #[test]
    fn ref_id_minus_one_renders_star() {
        let mut record = base_record();
        record.ref_id = -1;
        record.next_ref_id = -1;
        let names = vec!["chr1".to_string()];
        let mut out = Vec::new();
        write_record(&record, &names, &mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        let fields: Vec<_> = line.split('\t').collect();
        assert_eq!(fields[2], "*"); // RNAME
        assert_eq!(fields[6], "*"); // RNEXT
    }
}
