//! Pass 2: operand parsing and code emission.
//!
//! Walks the same lines as pass 1 with the finished label table in hand,
//! parses every operand in full and emits bytes into the [Image]. Range
//! and ROM warnings are non-fatal; the bytes are written regardless.

use super::LineCtx;
use crate::binary::{Binary, Image, ROM_START};
use crate::error::{Diagnostics, ErrorCode, WarningCode};
use crate::instruction::{self, Encoding, Gr, Xr};
use crate::parsing::{is_printable, Source};
use crate::symbol_table::LabelTable;

pub(super) fn run(src: &Source, labels: &LabelTable, diag: &mut Diagnostics) -> Binary {
    let mut start: u8 = 0;
    let mut addr: u8 = 0;
    let mut image = Image::new();

    for num in 1..=src.len() {
        let line = src.line(num).unwrap();
        let mut ctx = LineCtx::new(line, num, labels, diag);
        line2(&mut ctx, &mut start, &mut addr, &mut image);
    }

    if addr > ROM_START {
        diag.file_warning(
            WarningCode::BinaryTooLarge,
            format!(
                "the program uses memory up to {:03X}H.\n\
                 addresses from {:03X}H up are ROM and cannot hold the program.",
                addr.wrapping_sub(1),
                ROM_START
            ),
        );
    }

    Binary::from_image(&image, start, addr.wrapping_sub(start))
}

fn line2(ctx: &mut LineCtx, start: &mut u8, addr: &mut u8, image: &mut Image) {
    if ctx.cur.at_name_start() {
        // The label was resolved in the first pass.
        ctx.cur.skip_name();
        ctx.cur.eat(b':');
    }

    ctx.cur.skip_space();
    if ctx.cur.at_name_start() {
        let inst = ctx.cur.take_name();

        let parsed = match inst.as_str() {
            "EQU" => ctx.scan_add(),
            "ORG" => org(ctx, start, addr, image),
            "DS" => ds(ctx, addr, image),
            "DC" => emit_expr_list(ctx, addr, image),
            _ => match instruction::lookup(&inst) {
                Some(encoding) => emit_instruction(ctx, encoding, &inst, addr, image),
                None => unreachable!("pass 1 accepted an unknown mnemonic"),
            },
        };

        if parsed.is_none() {
            return;
        }
    }

    ctx.cur.skip_space_or_comment();
    if !ctx.cur.at_end() {
        let pos = ctx.cur.pos();
        ctx.error(pos, None, ErrorCode::InvalidOperand);
    }
}

fn org(ctx: &mut LineCtx, start: &mut u8, addr: &mut u8, image: &mut Image) -> Option<()> {
    let v = ctx.eval_add()?;

    if *addr == 0 {
        // Nothing emitted yet: move the load address itself.
        *start = v as u8;
        *addr = v as u8;
    } else {
        let mut a = *addr;
        while (a as i32) < v {
            image.fill_byte(a);
            a = a.wrapping_add(1);
            if a == 0 {
                break;
            }
        }
        *addr = a;
    }

    Some(())
}

fn ds(ctx: &mut LineCtx, addr: &mut u8, image: &mut Image) -> Option<()> {
    let mut v = ctx.eval_add()?;

    while v > 0 {
        image.fill_byte(*addr);
        *addr = addr.wrapping_add(1);
        v -= 1;
    }

    Some(())
}

/// Emits one `DC` item: each character of a string, or the 8-bit value of
/// an expression.
fn emit_expr(ctx: &mut LineCtx, addr: &mut u8, image: &mut Image) -> Option<()> {
    ctx.cur.skip_space();
    let beg = ctx.cur.pos();

    if ctx.cur.eat(b'"') {
        while matches!(ctx.cur.peek(), Some(b) if is_printable(b) && b != b'"') {
            image.write(*addr, ctx.cur.advance().unwrap());
            *addr = addr.wrapping_add(1);
        }
        if !ctx.cur.eat(b'"') {
            let len = ctx.cur.pos() - beg;
            ctx.error(beg, Some(len), ErrorCode::DoubleQuoteExpected);
            return None;
        }
    } else {
        let value = ctx.eval_add()?;
        if value < -256 || value > 0xFF {
            let len = ctx.cur.pos() - beg;
            ctx.warn(
                beg,
                Some(len),
                WarningCode::ValueOutOfRange,
                format!("out-of-range value: {}", value),
            );
        }
        image.write(*addr, value as u8);
        *addr = addr.wrapping_add(1);
    }

    Some(())
}

fn emit_expr_list(ctx: &mut LineCtx, addr: &mut u8, image: &mut Image) -> Option<()> {
    emit_expr(ctx, addr, image)?;

    loop {
        ctx.cur.skip_space();
        if ctx.cur.eat(b',') {
            emit_expr(ctx, addr, image)?;
        } else {
            break;
        }
    }

    Some(())
}

fn emit_instruction(
    ctx: &mut LineCtx,
    encoding: Encoding,
    inst: &str,
    addr: &mut u8,
    image: &mut Image,
) -> Option<()> {
    match encoding {
        Encoding::Plain { base } => {
            image.write(*addr, base);
            *addr = addr.wrapping_add(1);
        }
        Encoding::Register { base } => {
            ctx.cur.skip_space();
            let gr = take_register(ctx)?;
            image.write(*addr, base | gr.field());
            *addr = addr.wrapping_add(1);
        }
        Encoding::Port { base } => {
            ctx.cur.skip_space();
            let gr = take_register(ctx)?;

            ctx.cur.skip_space();
            if !ctx.cur.eat(b',') {
                let pos = ctx.cur.pos();
                if ctx.cur.at_end() {
                    ctx.error_note(
                        pos,
                        None,
                        ErrorCode::CommaExpected,
                        format!("the {} instruction needs an I/O address", inst),
                    );
                } else {
                    ctx.error(pos, None, ErrorCode::CommaExpected);
                }
                return None;
            }

            let port_beg = ctx.cur.pos();
            let port = ctx.eval_add()?;
            if port < 0 || port >= 0x10 {
                let len = ctx.cur.pos() - port_beg;
                ctx.warn(
                    port_beg,
                    Some(len),
                    WarningCode::IoAddressOutOfRange,
                    format!("out-of-range I/O address: {:03X}H", port & 0xFF),
                );
            }

            image.write(*addr, base | gr.field());
            image.write(addr.wrapping_add(1), port as u8);
            *addr = addr.wrapping_add(2);
        }
        Encoding::Memory { base } => {
            ctx.cur.skip_space();
            let gr = take_register(ctx)?;

            ctx.cur.skip_space();
            if !ctx.cur.eat(b',') {
                let pos = ctx.cur.pos();
                ctx.error(pos, None, ErrorCode::CommaExpected);
                return None;
            }

            ctx.cur.skip_space();
            let mut xr = Xr::Direct;
            let operand;
            if ctx.cur.eat(b'#') {
                xr = Xr::Immediate;
                operand = take_address(ctx)?;
            } else {
                operand = take_address(ctx)?;
                ctx.cur.skip_space();
                if ctx.cur.eat(b',') {
                    ctx.cur.skip_space();
                    xr = take_index_register(ctx)?;
                }
            }

            image.write(*addr, base | gr.field() | xr.field());
            image.write(addr.wrapping_add(1), operand);
            *addr = addr.wrapping_add(2);
        }
        Encoding::Store { base } => {
            ctx.cur.skip_space();
            let gr = take_register(ctx)?;

            ctx.cur.skip_space();
            if !ctx.cur.eat(b',') {
                let pos = ctx.cur.pos();
                ctx.error(pos, None, ErrorCode::CommaExpected);
                return None;
            }

            ctx.cur.skip_space();
            if ctx.cur.eat(b'#') {
                let pos = ctx.cur.pos() - 1;
                ctx.error(pos, None, ErrorCode::InvalidImmediate);
                return None;
            }

            let operand_beg = ctx.cur.pos();
            let operand = take_address(ctx)?;
            let operand_len = ctx.cur.pos() - operand_beg;

            ctx.cur.skip_space();
            let mut xr = Xr::Direct;
            if ctx.cur.eat(b',') {
                ctx.cur.skip_space();
                xr = take_index_register(ctx)?;
            } else if operand >= ROM_START {
                ctx.warn(
                    operand_beg,
                    Some(operand_len),
                    WarningCode::WritingToRomArea,
                    format!(
                        "address {:03X}H is the store destination.\n\
                         addresses from {:03X}H up are ROM; executing this \
                         instruction leaves main memory unchanged.",
                        operand, ROM_START
                    ),
                );
            }

            image.write(*addr, base | gr.field() | xr.field());
            image.write(addr.wrapping_add(1), operand);
            *addr = addr.wrapping_add(2);
        }
        Encoding::Branch { base } => {
            let operand = take_address(ctx)?;

            ctx.cur.skip_space();
            let mut xr = Xr::Direct;
            if ctx.cur.eat(b',') {
                ctx.cur.skip_space();
                xr = take_index_register(ctx)?;
            }

            image.write(*addr, base | xr.field());
            image.write(addr.wrapping_add(1), operand);
            *addr = addr.wrapping_add(2);
        }
    }

    Some(())
}

fn take_register(ctx: &mut LineCtx) -> Option<Gr> {
    if !ctx.cur.at_name_start() {
        let pos = ctx.cur.pos();
        ctx.error(pos, None, ErrorCode::RegisterExpected);
        return None;
    }

    let beg = ctx.cur.pos();
    let name = ctx.cur.take_name();
    match Gr::from_name(&name) {
        Some(gr) => Some(gr),
        None => {
            let len = ctx.cur.pos() - beg;
            ctx.error_note(
                beg,
                Some(len),
                ErrorCode::InvalidRegister,
                format!("no such register: \"{}\"", name),
            );
            None
        }
    }
}

fn take_index_register(ctx: &mut LineCtx) -> Option<Xr> {
    if !ctx.cur.at_name_start() {
        let pos = ctx.cur.pos();
        ctx.error(pos, None, ErrorCode::IndexRegisterExpected);
        return None;
    }

    let beg = ctx.cur.pos();
    let name = ctx.cur.take_name();
    match name.as_str() {
        "G1" => Some(Xr::G1Indexed),
        "G2" => Some(Xr::G2Indexed),
        _ => {
            let mut note = format!("no such index register: \"{}\"", name);
            if name == "G0" || name == "SP" {
                note.push_str("\nonly G1 and G2 can be used as index registers.");
            }
            let len = ctx.cur.pos() - beg;
            ctx.error_note(beg, Some(len), ErrorCode::InvalidIndexRegister, note);
            None
        }
    }
}

/// Reads an address or immediate operand, warning when the value does not
/// fit an 8-bit encoding.
fn take_address(ctx: &mut LineCtx) -> Option<u8> {
    let beg = ctx.cur.pos();
    let value = ctx.eval_add()?;

    if value < -128 || value > 0xFF {
        let len = ctx.cur.pos() - beg;
        ctx.warn(
            beg,
            Some(len),
            WarningCode::AddressOutOfRange,
            format!("out-of-range address: {}", value),
        );
    }

    Some(value as u8)
}
