//! Pass 1: instruction sizing and label assignment.
//!
//! Labels may only start in column 0; anything else at the start of a line
//! is an instruction line. A label takes the current address unless the
//! line carries `EQU` or `ORG`, which give it their operand value instead.
//! Any error on the line drops its pending label definition, matching the
//! behavior of resolving as much as possible while the line is broken.

use super::LineCtx;
use crate::error::{Diagnostics, ErrorCode, Note, WarningCode};
use crate::instruction;
use crate::parsing::{is_printable, Source};
use crate::symbol_table::LabelTable;

pub(super) fn run(src: &Source, labels: &mut LabelTable, diag: &mut Diagnostics) {
    let mut addr: u8 = 0;

    for num in 1..=src.len() {
        let line = src.line(num).unwrap();
        let mut ctx = LineCtx::new(line, num, labels, diag);

        if let Some((name, value)) = line1(&mut ctx, &mut addr) {
            // Redefinitions were already reported; the first one wins.
            let _ = labels.define(name, value, num);
        }
    }
}

/// Processes one line, advancing the location counter, and returns a
/// pending label definition if the line carries one and parsed cleanly.
fn line1(ctx: &mut LineCtx, addr: &mut u8) -> Option<(String, u8)> {
    let mut label = None;

    if ctx.cur.at_name_start() {
        debug_assert_eq!(ctx.cur.pos(), 0);
        let name = ctx.cur.take_name();
        ctx.cur.eat(b':');

        if let Some(previous) = ctx.labels.get(&name) {
            let len = ctx.cur.pos();
            let notes = vec![
                Note::Text(format!("duplicated label: \"{}\"", name)),
                Note::DefinedAt {
                    line: previous.line,
                    span: 0..name.len(),
                },
            ];
            ctx.error_with_notes(0, Some(len), ErrorCode::DuplicatedLabel, notes);
        }

        label = Some(name);
    } else if !ctx.cur.at_space_or_comment() {
        let printable = matches!(ctx.cur.peek(), Some(b) if is_printable(b));
        if printable {
            ctx.error_note(
                0,
                None,
                ErrorCode::InvalidLabel,
                "labels must start with a letter or '_' (underscore)".to_string(),
            );
        } else {
            ctx.error(0, None, ErrorCode::InvalidLabel);
        }
        return None;
    }

    let mut value = *addr;

    ctx.cur.skip_space();
    if ctx.cur.at_name_start() {
        let name_beg = ctx.cur.pos();
        let inst = ctx.cur.take_name();

        match inst.as_str() {
            "EQU" => {
                let value_beg = ctx.cur.pos();
                let v = ctx.eval_add()?;
                if v < -256 || v > 0xFF {
                    let len = ctx.cur.pos() - value_beg;
                    ctx.warn(
                        value_beg,
                        Some(len),
                        WarningCode::ValueOutOfRange,
                        format!("out-of-range value: {}", v),
                    );
                }
                value = v as u8;
            }
            "ORG" => {
                let addr_beg = ctx.cur.pos();
                let v = ctx.eval_add()?;
                if v < *addr as i32 {
                    let len = ctx.cur.pos() - addr_beg;
                    ctx.error_note(
                        addr_beg,
                        Some(len),
                        ErrorCode::InvalidOrg,
                        format!(
                            "(current address: {:03X}H, requested address: {:03X}H)",
                            addr,
                            v & 0xFF
                        ),
                    );
                    return None;
                }
                value = v as u8;
                *addr = v as u8;
            }
            "DS" => {
                let v = ctx.eval_add()?;
                *addr = addr.wrapping_add(v as u8);
            }
            "DC" => {
                let mut count: u8 = 0;
                ctx.scan_expr_list(&mut count)?;
                *addr = addr.wrapping_add(count);
            }
            _ => {
                if let Some(encoding) = instruction::lookup(&inst) {
                    *addr = addr.wrapping_add(encoding.size());
                    // Operands are only parsed in the second pass.
                    ctx.cur.skip_to_end();
                } else {
                    let mut notes = vec![Note::Text(format!("opcode: {}", inst))];
                    if let Some(name) = &label {
                        if instruction::lookup(name).is_some() {
                            notes.push(Note::Text(format!(
                                "the label (\"{}\") matches an opcode.\n\
                                 lines without a label must start with a space or tab.",
                                name
                            )));
                        }
                    }
                    let len = ctx.cur.pos() - name_beg;
                    ctx.error_with_notes(
                        name_beg,
                        Some(len),
                        ErrorCode::UnknownInstruction,
                        notes,
                    );
                    return None;
                }
            }
        }
    }

    label.map(|name| (name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Source;

    fn pass1(input: &str) -> (LabelTable, Diagnostics) {
        let src = Source::from_str(input);
        let mut labels = LabelTable::new();
        let mut diag = Diagnostics::new();
        run(&src, &mut labels, &mut diag);
        (labels, diag)
    }

    #[test]
    fn labels_take_the_current_address() {
        let (labels, diag) = pass1("A: NO\nB: LD G0,#1\nC: HALT\n");

        assert!(!diag.has_errors());
        assert_eq!(labels.get("A").unwrap().value, 0);
        assert_eq!(labels.get("B").unwrap().value, 1);
        assert_eq!(labels.get("C").unwrap().value, 3);
    }

    #[test]
    fn equ_overrides_the_address() {
        let (labels, diag) = pass1("PORT: EQU 3\nSTART: NO\n");

        assert!(!diag.has_errors());
        assert_eq!(labels.get("PORT").unwrap().value, 3);
        assert_eq!(labels.get("START").unwrap().value, 0);
    }

    #[test]
    fn org_moves_the_location_counter() {
        let (labels, diag) = pass1("      ORG 10H\nHERE: NO\n");

        assert!(!diag.has_errors());
        assert_eq!(labels.get("HERE").unwrap().value, 0x10);
    }

    #[test]
    fn org_backwards_is_an_error() {
        let (_, diag) = pass1("      DS 8\n      ORG 2\n");

        assert!(diag.has_error(ErrorCode::InvalidOrg));
    }

    #[test]
    fn duplicate_label_keeps_the_first_definition() {
        let (labels, diag) = pass1("FOO: NO\nFOO: NO\n");

        assert!(diag.has_error(ErrorCode::DuplicatedLabel));
        assert_eq!(labels.get("FOO").unwrap().line, 1);
    }

    #[test]
    fn dc_advances_by_string_and_item_bytes() {
        let (labels, diag) = pass1("      DC \"HI\", 1, 2\nEND_: NO\n");

        assert!(!diag.has_errors());
        assert_eq!(labels.get("END_").unwrap().value, 4);
    }

    #[test]
    fn unknown_instruction_reports_the_mnemonic() {
        let (_, diag) = pass1("      FROB G0\n");

        assert!(diag.has_error(ErrorCode::UnknownInstruction));
    }

    #[test]
    fn line_starting_with_a_digit_is_an_invalid_label() {
        let (_, diag) = pass1("1ABEL: NO\n");

        assert!(diag.has_error(ErrorCode::InvalidLabel));
    }
}
