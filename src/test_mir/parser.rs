//! MIR parser implementation.

use crate::core::{
    BlockItem, MachineBasicBlock, MachineFunction, MachineInstr, MachineOperand, MemBase, MemRef,
    PacketizeResult, PacketizerError,
};
use crate::target::TargetInfo;

/// Parse every function in `text`.
pub fn parse_functions<T: TargetInfo + ?Sized>(
    target: &T,
    text: &str,
) -> PacketizeResult<Vec<MachineFunction>> {
    Parser::new(target).parse(text)
}

/// Where the parser is inside a function.
enum Scope {
    Module,
    Function(MachineFunction),
    Bundle(MachineFunction, Vec<MachineInstr>),
}

struct Parser<'t, T: TargetInfo + ?Sized> {
    target: &'t T,
    line: usize,
}

/// Split on commas that are not inside angle brackets or parentheses.
fn split_operands(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (pos, ch) in text.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..pos].trim());
                start = pos + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

impl<'t, T: TargetInfo + ?Sized> Parser<'t, T> {
    fn new(target: &'t T) -> Self {
        Self { target, line: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> PacketizerError {
        PacketizerError::Parse {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn parse(mut self, text: &str) -> PacketizeResult<Vec<MachineFunction>> {
        let mut functions = Vec::new();
        let mut scope = Scope::Module;

        for (idx, raw) in text.lines().enumerate() {
            self.line = idx + 1;
            let line = raw.split(';').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            scope = match scope {
                Scope::Module => Scope::Function(self.parse_header(line)?),
                Scope::Function(mut mf) => {
                    if line == "}" {
                        functions.push(mf);
                        Scope::Module
                    } else if line == "{" {
                        self.current_block(&mut mf)?;
                        Scope::Bundle(mf, Vec::new())
                    } else if let Some(name) = line.strip_prefix("bb ") {
                        let name = name
                            .strip_suffix(':')
                            .ok_or_else(|| self.error("block label must end with ':'"))?;
                        mf.blocks.push(MachineBasicBlock::new(name.trim()));
                        Scope::Function(mf)
                    } else {
                        let mi = self.parse_instr(line)?;
                        self.current_block(&mut mf)?.push(mi);
                        Scope::Function(mf)
                    }
                }
                Scope::Bundle(mut mf, mut instrs) => {
                    if line == "}" {
                        self.current_block(&mut mf)?
                            .items
                            .push(BlockItem::Bundle(instrs));
                        Scope::Function(mf)
                    } else {
                        instrs.push(self.parse_instr(line)?);
                        Scope::Bundle(mf, instrs)
                    }
                }
            };
        }

        match scope {
            Scope::Module => Ok(functions),
            _ => Err(self.error("unexpected end of input")),
        }
    }

    fn current_block<'m>(
        &self,
        mf: &'m mut MachineFunction,
    ) -> PacketizeResult<&'m mut MachineBasicBlock> {
        mf.blocks
            .last_mut()
            .ok_or_else(|| self.error("instruction outside a block"))
    }

    /// `func NAME [frame=N] {`
    fn parse_header(&self, line: &str) -> PacketizeResult<MachineFunction> {
        let rest = line
            .strip_prefix("func ")
            .and_then(|rest| rest.strip_suffix('{'))
            .ok_or_else(|| self.error(format!("expected function header, found '{line}'")))?;
        let mut words = rest.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| self.error("missing function name"))?;
        let mut frame_size = 0;
        for word in words {
            let value = word
                .strip_prefix("frame=")
                .ok_or_else(|| self.error(format!("unknown function attribute '{word}'")))?;
            frame_size = value
                .parse()
                .map_err(|_| self.error(format!("invalid frame size '{value}'")))?;
        }
        Ok(MachineFunction::new(name, frame_size))
    }

    fn parse_instr(&self, line: &str) -> PacketizeResult<MachineInstr> {
        let (body, mem) = match line.split_once("::") {
            Some((body, mem)) => (body.trim(), Some(mem.trim())),
            None => (line, None),
        };
        let (defs, rest) = match body.split_once('=') {
            Some((defs, rest)) => (defs.trim(), rest.trim()),
            None => ("", body),
        };
        let (name, uses) = match rest.split_once(char::is_whitespace) {
            Some((name, uses)) => (name, uses.trim()),
            None => (rest, ""),
        };
        let opcode = self
            .target
            .opcode_by_name(name)
            .ok_or_else(|| PacketizerError::UnknownOpcode {
                name: name.to_string(),
            })?;

        let mut explicit = Vec::new();
        let mut implicit = Vec::new();
        let tokens = split_operands(defs)
            .into_iter()
            .map(|tok| (tok, true))
            .chain(split_operands(uses).into_iter().map(|tok| (tok, false)));
        for (tok, is_def) in tokens {
            let mo = self.parse_operand(tok, is_def)?;
            if mo.implicit {
                implicit.push(mo);
            } else {
                explicit.push(mo);
            }
        }

        let mut mi = MachineInstr::with_operands(opcode, explicit);
        for mo in implicit {
            mi.add_operand(mo);
        }
        let desc = self.target.desc(opcode);
        for &reg in desc.implicit_defs {
            if !mi.operands.iter().any(|mo| mo.implicit && mo.is_def && mo.reg() == Some(reg)) {
                mi.add_operand(MachineOperand::implicit_def(reg));
            }
        }
        for &reg in desc.implicit_uses {
            if !mi.operands.iter().any(|mo| mo.implicit && !mo.is_def && mo.reg() == Some(reg)) {
                mi.add_operand(MachineOperand::implicit_use(reg));
            }
        }

        if let Some(mem) = mem {
            for word in mem.split_whitespace() {
                mi.mem_refs.push(self.parse_mem(word)?);
            }
        }
        Ok(mi)
    }

    fn parse_operand(&self, tok: &str, is_def: bool) -> PacketizeResult<MachineOperand> {
        if tok.is_empty() {
            return Err(self.error("empty operand"));
        }
        let (base, mods): (&str, Vec<&str>) = match tok.find('<') {
            Some(pos) => {
                let mods = tok[pos + 1..]
                    .strip_suffix('>')
                    .ok_or_else(|| self.error(format!("unterminated modifier in '{tok}'")))?;
                (&tok[..pos], mods.split(',').map(str::trim).collect())
            }
            None => (tok, Vec::new()),
        };

        if let Some(value) = base.strip_prefix('#') {
            let value = value
                .parse()
                .map_err(|_| self.error(format!("invalid immediate '{base}'")))?;
            return Ok(MachineOperand::imm(value));
        }
        if let Some(name) = base.strip_prefix('@') {
            return Ok(MachineOperand::symbol(name));
        }

        let reg = self
            .target
            .reg_by_name(base)
            .ok_or_else(|| PacketizerError::UnknownRegister {
                name: base.to_string(),
            })?;
        let mut mo = if is_def {
            MachineOperand::def(reg)
        } else {
            MachineOperand::use_reg(reg)
        };
        for m in mods {
            mo = match m {
                "dead" => mo.dead(),
                "kill" => mo.killed(),
                "imp-def" => MachineOperand {
                    is_def: true,
                    implicit: true,
                    ..mo
                },
                "imp-use" => MachineOperand {
                    is_def: false,
                    implicit: true,
                    ..mo
                },
                other => return Err(self.error(format!("unknown modifier '{other}'"))),
            };
        }
        Ok(mo)
    }

    /// `mem(BASE[+-]OFFSET,SIZE[,volatile])` with BASE a register, `@sym` or `?`.
    fn parse_mem(&self, word: &str) -> PacketizeResult<MemRef> {
        let inner = word
            .strip_prefix("mem(")
            .and_then(|w| w.strip_suffix(')'))
            .ok_or_else(|| self.error(format!("invalid memory reference '{word}'")))?;
        let mut fields = inner.split(',');
        let addr = fields.next().unwrap_or("");
        let size = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error(format!("missing access size in '{word}'")))?;
        let volatile = match fields.next() {
            None => false,
            Some("volatile") => true,
            Some(other) => return Err(self.error(format!("unknown memory flag '{other}'"))),
        };

        let split = addr
            .char_indices()
            .skip(1)
            .find(|&(_, ch)| ch == '+' || ch == '-')
            .map(|(pos, _)| pos);
        let (base, offset) = match split {
            Some(pos) => {
                let offset = addr[pos..]
                    .trim_start_matches('+')
                    .parse()
                    .map_err(|_| self.error(format!("invalid offset in '{word}'")))?;
                (&addr[..pos], offset)
            }
            None => (addr, 0),
        };
        let base = if base == "?" {
            MemBase::Unknown
        } else if let Some(name) = base.strip_prefix('@') {
            MemBase::Symbol(name.to_string())
        } else {
            MemBase::Reg(self.target.reg_by_name(base).ok_or_else(|| {
                PacketizerError::UnknownRegister {
                    name: base.to_string(),
                }
            })?)
        };

        let mut mem = MemRef::new(base, offset, size);
        if volatile {
            mem = mem.volatile();
        }
        Ok(mem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::opcodes::*;
    use crate::dsp::registers::*;
    use crate::dsp::DspTarget;

    #[test]
    fn test_parse_function() {
        let target = DspTarget::new();
        let text = r#"
; leading comment
func f frame=24 {
bb entry:
    r1 = add r2, r3   ; trailing comment
    store sp, #8, r1 :: mem(sp+8,4)
bb exit:
    dealloc_return
}
"#;
        let functions = parse_functions(&target, text).unwrap();
        assert_eq!(functions.len(), 1);
        let mf = &functions[0];
        assert_eq!(mf.frame_size, 24);
        assert_eq!(mf.blocks.len(), 2);

        let store = &mf.blocks[0].items[1].instrs()[0];
        assert_eq!(store.opcode, STORE);
        assert_eq!(store.operand_reg(0), Some(SP));
        assert_eq!(store.operands[1].imm_value(), Some(8));
        assert_eq!(store.mem_refs[0], MemRef::new(MemBase::Reg(SP), 8, 4));

        // Descriptor implicit operands are appended.
        let ret = &mf.blocks[1].items[0].instrs()[0];
        assert!(ret.defines_register(LR));
        assert!(ret.reads_register(FP, &target));
    }

    #[test]
    fn test_parse_bundle_and_modifiers() {
        let target = DspTarget::new();
        let text = "func g {\nbb b0:\n{\nr1<dead> = add r2<kill>, r3\np0 = cmp_eqi r1, #-4\n}\n}\n";
        let functions = parse_functions(&target, text).unwrap();
        let item = &functions[0].blocks[0].items[0];
        assert!(item.is_bundle());
        let add = &item.instrs()[0];
        assert!(add.operands[0].dead);
        assert!(add.operands[1].kill);
        assert_eq!(item.instrs()[1].operands[2].imm_value(), Some(-4));
    }

    #[test]
    fn test_parse_errors() {
        let target = DspTarget::new();
        let err = parse_functions(&target, "func f {\nbb a:\n  r1 = frob r2\n}\n").unwrap_err();
        assert_eq!(
            err,
            PacketizerError::UnknownOpcode {
                name: "frob".to_string()
            }
        );

        let err = parse_functions(&target, "func f {\nbb a:\n  r99 = add r2, r3\n}\n").unwrap_err();
        assert!(matches!(err, PacketizerError::UnknownRegister { .. }));

        let err = parse_functions(&target, "func f {\n  r1 = add r2, r3\n}\n").unwrap_err();
        assert!(matches!(err, PacketizerError::Parse { line: 2, .. }));

        let err = parse_functions(&target, "func f {\nbb a:\n").unwrap_err();
        assert!(matches!(err, PacketizerError::Parse { .. }));
    }

    #[test]
    fn test_split_operands() {
        assert_eq!(split_operands("r1, usr<imp-def,dead>"), vec!["r1", "usr<imp-def,dead>"]);
        assert!(split_operands("").is_empty());
    }
}
