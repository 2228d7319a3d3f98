use crate::error::*;
use crate::il::*;
use crate::translator::x86::X86;
use crate::translator::InstructionTranslationResult;
use std::collections::HashMap;

/// A concrete machine state for executing lifted IL in tests.
#[derive(Clone, Debug)]
struct State {
    variables: HashMap<String, Constant>,
    memory: HashMap<u64, u8>,
}

impl State {
    /// A state with all general purpose registers and flags zeroed, and the
    /// direction register set to forward.
    fn new() -> State {
        let mut state = State {
            variables: HashMap::new(),
            memory: HashMap::new(),
        };
        for name in &["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"] {
            state.set(name, 0, 32);
        }
        for name in &["CF", "PF", "AF", "ZF", "SF", "OF"] {
            state.set(name, 0, 1);
        }
        state.set("DFLAG", 1, 32);
        state.set("fs_base", 0, 32);
        state.set("gs_base", 0, 32);
        state
    }

    fn set(&mut self, name: &str, value: u64, bits: usize) {
        self.variables
            .insert(name.to_string(), Constant::new(value, bits));
    }

    fn get(&self, name: &str) -> u64 {
        self.variables
            .get(name)
            .unwrap_or_else(|| panic!("variable {} not set", name))
            .value()
    }

    fn is_havoc(&self, name: &str) -> bool {
        !self.variables.contains_key(name)
    }

    fn set_memory(&mut self, address: u64, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.memory.insert(address + i as u64, *byte);
        }
    }

    fn get_memory(&self, address: u64) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }
}

fn eval_memory(state: &State, expression: &Expression) -> Result<HashMap<u64, u8>> {
    match expression {
        Expression::Variable(variable) if variable.sort().is_mem() => Ok(state.memory.clone()),
        Expression::Store {
            memory,
            index,
            value,
            bits,
            ..
        } => {
            let mut map = eval_memory(state, memory)?;
            let address = eval(state, index)?.value();
            let value = eval(state, value)?.value();
            for i in 0..bits / 8 {
                map.insert(address + i as u64, (value >> (i * 8)) as u8);
            }
            Ok(map)
        }
        _ => Err(format!("not a memory expression: {}", expression).into()),
    }
}

fn eval(state: &State, expression: &Expression) -> Result<Constant> {
    match expression {
        Expression::Constant(constant) => Ok(constant.clone()),
        Expression::Variable(variable) => state
            .variables
            .get(variable.name())
            .cloned()
            .ok_or_else(|| format!("variable {} not set", variable.name()).into()),
        Expression::Load {
            memory,
            index,
            bits,
            ..
        } => {
            let map = eval_memory(state, memory)?;
            let address = eval(state, index)?.value();
            let mut value: u64 = 0;
            for i in 0..bits / 8 {
                let byte = map.get(&(address + i as u64)).copied().unwrap_or(0);
                value |= (byte as u64) << (i * 8);
            }
            Ok(Constant::new(value, *bits))
        }
        Expression::Store { .. } => Err("memory value in scalar context".into()),
        Expression::Not(src) => {
            let src = eval(state, src)?;
            Ok(Constant::new(!src.value(), src.bits()))
        }
        Expression::Neg(src) => {
            let src = eval(state, src)?;
            Ok(Constant::new(src.value().wrapping_neg(), src.bits()))
        }
        Expression::Add(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            Ok(Constant::new(
                lhs.value().wrapping_add(rhs.value()),
                lhs.bits(),
            ))
        }
        Expression::Sub(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            Ok(Constant::new(
                lhs.value().wrapping_sub(rhs.value()),
                lhs.bits(),
            ))
        }
        Expression::Mul(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            Ok(Constant::new(
                lhs.value().wrapping_mul(rhs.value()),
                lhs.bits(),
            ))
        }
        Expression::Divu(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            if rhs.value() == 0 {
                return Err("division by zero".into());
            }
            Ok(Constant::new(lhs.value() / rhs.value(), lhs.bits()))
        }
        Expression::Modu(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            if rhs.value() == 0 {
                return Err("division by zero".into());
            }
            Ok(Constant::new(lhs.value() % rhs.value(), lhs.bits()))
        }
        Expression::Divs(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            if rhs.value() == 0 {
                return Err("division by zero".into());
            }
            let quotient = lhs.value_i64().wrapping_div(rhs.value_i64());
            Ok(Constant::new(quotient as u64, lhs.bits()))
        }
        Expression::Mods(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            if rhs.value() == 0 {
                return Err("division by zero".into());
            }
            let remainder = lhs.value_i64().wrapping_rem(rhs.value_i64());
            Ok(Constant::new(remainder as u64, lhs.bits()))
        }
        Expression::And(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            Ok(Constant::new(lhs.value() & rhs.value(), lhs.bits()))
        }
        Expression::Or(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            Ok(Constant::new(lhs.value() | rhs.value(), lhs.bits()))
        }
        Expression::Xor(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            Ok(Constant::new(lhs.value() ^ rhs.value(), lhs.bits()))
        }
        Expression::Shl(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let shift = eval(state, rhs)?.value();
            if shift >= lhs.bits() as u64 {
                Ok(Constant::new(0, lhs.bits()))
            } else {
                Ok(Constant::new(lhs.value() << shift, lhs.bits()))
            }
        }
        Expression::Shr(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let shift = eval(state, rhs)?.value();
            if shift >= lhs.bits() as u64 {
                Ok(Constant::new(0, lhs.bits()))
            } else {
                Ok(Constant::new(lhs.value() >> shift, lhs.bits()))
            }
        }
        Expression::Sra(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let shift = eval(state, rhs)?.value().min(63);
            Ok(Constant::new((lhs.value_i64() >> shift) as u64, lhs.bits()))
        }
        Expression::Cmpeq(lhs, rhs) => {
            let equal = eval(state, lhs)?.value() == eval(state, rhs)?.value();
            Ok(Constant::new(equal as u64, 1))
        }
        Expression::Cmpneq(lhs, rhs) => {
            let unequal = eval(state, lhs)?.value() != eval(state, rhs)?.value();
            Ok(Constant::new(unequal as u64, 1))
        }
        Expression::Cmplts(lhs, rhs) => {
            let less = eval(state, lhs)?.value_i64() < eval(state, rhs)?.value_i64();
            Ok(Constant::new(less as u64, 1))
        }
        Expression::Cmpltu(lhs, rhs) => {
            let less = eval(state, lhs)?.value() < eval(state, rhs)?.value();
            Ok(Constant::new(less as u64, 1))
        }
        Expression::Zext(bits, src) => Ok(Constant::new(eval(state, src)?.value(), *bits)),
        Expression::Sext(bits, src) => {
            Ok(Constant::new(eval(state, src)?.value_i64() as u64, *bits))
        }
        Expression::Trun(bits, src) => Ok(Constant::new(eval(state, src)?.value(), *bits)),
        Expression::Extract(hi, lo, src) => {
            let value = eval(state, src)?.value();
            Ok(Constant::new(value >> lo, hi - lo + 1))
        }
        Expression::Concat(lhs, rhs) => {
            let lhs = eval(state, lhs)?;
            let rhs = eval(state, rhs)?;
            let bits = lhs.bits() + rhs.bits();
            if bits > 64 {
                return Err("concat wider than 64 bits".into());
            }
            Ok(Constant::new(
                (lhs.value() << rhs.bits()) | rhs.value(),
                bits,
            ))
        }
        Expression::Ite {
            condition,
            true_case,
            false_case,
        } => {
            if eval(state, condition)?.is_one() {
                eval(state, true_case)
            } else {
                eval(state, false_case)
            }
        }
        Expression::Unknown { reason, .. } => Err(format!("unknown value: {}", reason).into()),
        Expression::Lab(name) => Err(format!("label in scalar context: {}", name).into()),
    }
}

fn contains_unknown(expression: &Expression) -> bool {
    match expression {
        Expression::Unknown { .. } => true,
        Expression::Constant(_) | Expression::Variable(_) | Expression::Lab(_) => false,
        Expression::Load { memory, index, .. } => {
            contains_unknown(memory) || contains_unknown(index)
        }
        Expression::Store {
            memory,
            index,
            value,
            ..
        } => contains_unknown(memory) || contains_unknown(index) || contains_unknown(value),
        Expression::Not(src)
        | Expression::Neg(src)
        | Expression::Zext(_, src)
        | Expression::Sext(_, src)
        | Expression::Trun(_, src)
        | Expression::Extract(_, _, src) => contains_unknown(src),
        Expression::Add(lhs, rhs)
        | Expression::Sub(lhs, rhs)
        | Expression::Mul(lhs, rhs)
        | Expression::Divu(lhs, rhs)
        | Expression::Modu(lhs, rhs)
        | Expression::Divs(lhs, rhs)
        | Expression::Mods(lhs, rhs)
        | Expression::And(lhs, rhs)
        | Expression::Or(lhs, rhs)
        | Expression::Xor(lhs, rhs)
        | Expression::Shl(lhs, rhs)
        | Expression::Shr(lhs, rhs)
        | Expression::Sra(lhs, rhs)
        | Expression::Cmpeq(lhs, rhs)
        | Expression::Cmpneq(lhs, rhs)
        | Expression::Cmplts(lhs, rhs)
        | Expression::Cmpltu(lhs, rhs)
        | Expression::Concat(lhs, rhs) => contains_unknown(lhs) || contains_unknown(rhs),
        Expression::Ite {
            condition,
            true_case,
            false_case,
        } => {
            contains_unknown(condition)
                || contains_unknown(true_case)
                || contains_unknown(false_case)
        }
    }
}

fn label_position(statements: &[Statement], name: &str) -> usize {
    statements
        .iter()
        .position(|statement| match statement.operation() {
            Operation::Label {
                label: Label::Name(label),
            } => label == name,
            _ => false,
        })
        .unwrap_or_else(|| panic!("label {} not found", name))
}

/// Execute a lifted statement sequence. Returns the branch-out address, or
/// `None` if execution fell through the end.
fn execute(statements: &[Statement], state: &mut State) -> Option<u64> {
    let mut pc = 0;
    let mut steps = 0;
    while pc < statements.len() {
        steps += 1;
        assert!(steps < 100_000, "execution did not terminate");
        match statements[pc].operation() {
            Operation::Assign { dst, src } => {
                if dst.sort().is_mem() {
                    state.memory = eval_memory(state, src).unwrap();
                } else {
                    match eval(state, src) {
                        Ok(value) => {
                            state.variables.insert(dst.name().to_string(), value);
                        }
                        Err(e) => {
                            // unknowns havoc their destination
                            assert!(contains_unknown(src), "{}", e);
                            state.variables.remove(dst.name());
                        }
                    }
                }
                pc += 1;
            }
            Operation::Branch { target } => match target {
                Expression::Lab(name) => pc = label_position(statements, name),
                _ => return Some(eval(state, target).unwrap().value()),
            },
            Operation::ConditionalBranch {
                condition,
                true_target,
                false_target,
            } => {
                let target = if eval(state, condition).unwrap().is_one() {
                    true_target
                } else {
                    false_target
                };
                match target {
                    Expression::Lab(name) => pc = label_position(statements, name),
                    _ => return Some(eval(state, target).unwrap().value()),
                }
            }
            Operation::Assert { condition } => {
                assert!(eval(state, condition).unwrap().is_one());
                pc += 1;
            }
            Operation::Label { .. } | Operation::Intrinsic { .. } | Operation::Comment { .. } => {
                pc += 1;
            }
        }
    }
    None
}

fn lift(bytes: &[u8]) -> InstructionTranslationResult {
    X86::new().lift(bytes, 0).unwrap()
}

/// Lift and execute a single instruction at address 0.
fn run(bytes: &[u8], state: &mut State) -> Option<u64> {
    let result = lift(bytes);
    execute(result.statements(), state)
}

/// Lift and execute instructions until control leaves the byte range.
fn run_program(bytes: &[u8], state: &mut State) -> Option<u64> {
    let mut pc: u64 = 0;
    while (pc as usize) < bytes.len() {
        let result = X86::new().lift(bytes, pc).unwrap();
        match execute(result.statements(), state) {
            None => pc = result.next_address(),
            Some(target) => {
                if (target as usize) < bytes.len() {
                    pc = target;
                } else {
                    return Some(target);
                }
            }
        }
    }
    None
}

fn validate_statement(statement: &Statement) {
    match statement.operation() {
        Operation::Assign { dst, src } => {
            assert_eq!(dst.sort(), src.sort(), "in {}", statement);
            src.validate().unwrap();
        }
        Operation::Branch { target } => target.validate().unwrap(),
        Operation::ConditionalBranch {
            condition,
            true_target,
            false_target,
        } => {
            assert_eq!(condition.sort(), Type::Reg(1));
            condition.validate().unwrap();
            true_target.validate().unwrap();
            false_target.validate().unwrap();
        }
        Operation::Assert { condition } => condition.validate().unwrap(),
        Operation::Label { .. } | Operation::Intrinsic { .. } | Operation::Comment { .. } => {}
    }
}

// a spread of encodings used by the property tests
const CORPUS: &[&[u8]] = &[
    &[0x90],
    &[0xb8, 0x2a, 0x00, 0x00, 0x00],
    &[0x83, 0xc0, 0x01],
    &[0x29, 0xc0],
    &[0xf3, 0xa4],
    &[0xc3],
    &[0x01, 0xd8],
    &[0x66, 0x01, 0xd8],
    &[0x8b, 0x04, 0x8b],
    &[0x8b, 0x84, 0x8b, 0x44, 0x33, 0x22, 0x11],
    &[0x8b, 0x43, 0xfc],
    &[0x67, 0x8b, 0x07],
    &[0x8d, 0x48, 0xfd],
    &[0x50],
    &[0x5c],
    &[0xe8, 0x03, 0x00, 0x00, 0x00],
    &[0xc2, 0x08, 0x00],
    &[0x0f, 0x84, 0x10, 0x00, 0x00, 0x00],
    &[0x0f, 0x94, 0xc0],
    &[0xc1, 0xe0, 0x05],
    &[0xd3, 0xe8],
    &[0x0f, 0xa4, 0xd8, 0x04],
    &[0xf7, 0xf3],
    &[0xf7, 0xe3],
    &[0x0f, 0xaf, 0xc3],
    &[0x0f, 0xb6, 0xc3],
    &[0x0f, 0xbe, 0xc7],
    &[0x0f, 0xbc, 0xc3],
    &[0x0f, 0xa3, 0x03],
    &[0x0f, 0xb1, 0xd9],
    &[0x0f, 0xc1, 0xd8],
    &[0x64, 0xa1, 0x10, 0x00, 0x00, 0x00],
    &[0xf2, 0xae],
    &[0x9c],
    &[0x9d],
    &[0xc9],
    &[0x98],
    &[0x99],
    &[0xcd, 0x80],
    &[0x0f, 0x34],
    &[0x0f, 0x31],
    &[0x0f, 0xa2],
    &[0xf4],
    &[0x0f, 0x1f, 0x40, 0x00],
    &[0x66, 0x0f, 0xef, 0xc1],
    &[0x66, 0x0f, 0x6f, 0xc1],
    &[0x66, 0x0f, 0x76, 0xc1],
    &[0x66, 0x0f, 0xd7, 0xd4],
    &[0x66, 0x0f, 0x70, 0xc8, 0x1b],
    &[0x0f, 0x3a, 0x0f, 0xca, 0x04],
];

#[test]
fn nop() {
    // one-byte nop produces labels and nothing else
    let result = lift(&[0x90]);
    assert_eq!(result.next_address(), 1);
    assert!(result
        .statements()
        .iter()
        .all(|statement| statement.is_label()));
}

#[test]
fn multi_byte_nop() {
    let result = lift(&[0x0f, 0x1f, 0x40, 0x00]);
    assert_eq!(result.next_address(), 4);
    assert!(result
        .statements()
        .iter()
        .all(|statement| statement.is_label()));
}

#[test]
fn mov_eax_imm() {
    let mut state = State::new();
    state.set("ebx", 0x1234, 32);
    run(&[0xb8, 0x2a, 0x00, 0x00, 0x00], &mut state);
    assert_eq!(state.get("eax"), 42);
    // other registers are untouched
    assert_eq!(state.get("ebx"), 0x1234);
    assert_eq!(state.get("ecx"), 0);
}

#[test]
fn add_overflow_flags() {
    // add eax, 1 with eax = 0x7fffffff
    let mut state = State::new();
    state.set("eax", 0x7fff_ffff, 32);
    run(&[0x83, 0xc0, 0x01], &mut state);
    assert_eq!(state.get("eax"), 0x8000_0000);
    assert_eq!(state.get("OF"), 1);
    assert_eq!(state.get("SF"), 1);
    assert_eq!(state.get("ZF"), 0);
    assert_eq!(state.get("CF"), 0);
}

#[test]
fn sub_self() {
    // sub eax, eax
    let mut state = State::new();
    state.set("eax", 0xdead_beef, 32);
    run(&[0x29, 0xc0], &mut state);
    assert_eq!(state.get("eax"), 0);
    assert_eq!(state.get("ZF"), 1);
    assert_eq!(state.get("SF"), 0);
    assert_eq!(state.get("CF"), 0);
    assert_eq!(state.get("OF"), 0);
}

#[test]
fn rep_movsb() {
    // rep movsb with ecx = 3
    let mut state = State::new();
    state.set("ecx", 3, 32);
    state.set("esi", 0x100, 32);
    state.set("edi", 0x200, 32);
    state.set_memory(0x100, &[0x41, 0x42, 0x43]);
    let exit = run(&[0xf3, 0xa4], &mut state);
    assert_eq!(exit, Some(2));
    assert_eq!(state.get_memory(0x200), 0x41);
    assert_eq!(state.get_memory(0x201), 0x42);
    assert_eq!(state.get_memory(0x202), 0x43);
    assert_eq!(state.get("ecx"), 0);
    assert_eq!(state.get("esi"), 0x103);
    assert_eq!(state.get("edi"), 0x203);
}

#[test]
fn rep_movsb_ecx_zero() {
    // the initial test must skip the body entirely
    let mut state = State::new();
    state.set("esi", 0x100, 32);
    state.set("edi", 0x200, 32);
    state.set_memory(0x100, &[0x41]);
    let exit = run(&[0xf3, 0xa4], &mut state);
    assert_eq!(exit, Some(2));
    assert_eq!(state.get_memory(0x200), 0);
    assert_eq!(state.get("esi"), 0x100);
    assert_eq!(state.get("edi"), 0x200);
}

#[test]
fn ret() {
    let mut state = State::new();
    state.set("esp", 0x1000, 32);
    state.set_memory(0x1000, &[0xef, 0xbe, 0xad, 0xde]);
    let result = lift(&[0xc3]);
    let exit = execute(result.statements(), &mut state);
    assert_eq!(exit, Some(0xdead_beef));
    assert_eq!(state.get("esp"), 0x1004);
    assert!(result
        .statements()
        .iter()
        .any(|statement| statement.has_attribute(&Attribute::Ret)));
}

#[test]
fn ret_imm16() {
    let mut state = State::new();
    state.set("esp", 0x1000, 32);
    state.set_memory(0x1000, &[0x00, 0x10, 0x40, 0x00]);
    let exit = run(&[0xc2, 0x08, 0x00], &mut state);
    assert_eq!(exit, Some(0x0040_1000));
    assert_eq!(state.get("esp"), 0x1000 + 4 + 8);
}

#[test]
fn call_relative() {
    let mut state = State::new();
    state.set("esp", 0x1000, 32);
    let result = lift(&[0xe8, 0x03, 0x00, 0x00, 0x00]);
    let exit = execute(result.statements(), &mut state);
    // call is tagged, pushes the return address, and branches to next + disp
    assert_eq!(exit, Some(8));
    assert_eq!(state.get("esp"), 0xffc);
    assert_eq!(state.get_memory(0xffc), 5);
    assert!(result
        .statements()
        .iter()
        .any(|statement| statement.has_attribute(&Attribute::Call)));
}

#[test]
fn push_pop() {
    let mut state = State::new();
    state.set("esp", 0x1000, 32);
    state.set("eax", 0x11223344, 32);
    run(&[0x50], &mut state);
    assert_eq!(state.get("esp"), 0xffc);
    assert_eq!(state.get_memory(0xffc), 0x44);
    assert_eq!(state.get_memory(0xfff), 0x11);

    state.set("ebx", 0, 32);
    run(&[0x5b], &mut state);
    assert_eq!(state.get("ebx"), 0x11223344);
    assert_eq!(state.get("esp"), 0x1000);
}

#[test]
fn pop_esp_suppresses_increment() {
    // pop esp loads the new stack pointer and must not then adjust it
    let mut state = State::new();
    state.set("esp", 0x1000, 32);
    state.set_memory(0x1000, &[0x00, 0x20, 0x00, 0x00]);
    run(&[0x5c], &mut state);
    assert_eq!(state.get("esp"), 0x2000);
}

#[test]
fn xor_reg_reg() {
    let mut state = State::new();
    state.set("eax", 0xdead_beef, 32);
    state.set("CF", 1, 1);
    run(&[0x31, 0xc0], &mut state);
    assert_eq!(state.get("eax"), 0);
    assert_eq!(state.get("ZF"), 1);
    assert_eq!(state.get("PF"), 1);
    assert_eq!(state.get("SF"), 0);
    assert_eq!(state.get("CF"), 0);
    assert_eq!(state.get("OF"), 0);
    assert!(state.is_havoc("AF"));
}

#[test]
fn bt_memory_offset_17() {
    // bt [ebx], eax with an offset of 17 reads the byte at ebx + 2 and
    // tests bit 1
    let mut state = State::new();
    state.set("ebx", 0x100, 32);
    state.set("eax", 17, 32);
    state.set_memory(0x102, &[0b0000_0010]);
    run(&[0x0f, 0xa3, 0x03], &mut state);
    assert_eq!(state.get("CF"), 1);

    let mut state = State::new();
    state.set("ebx", 0x100, 32);
    state.set("eax", 17, 32);
    state.set_memory(0x102, &[0b0000_0001]);
    run(&[0x0f, 0xa3, 0x03], &mut state);
    assert_eq!(state.get("CF"), 0);
}

#[test]
fn undefined_condition_nibble() {
    // the condition table has no entry at nibble 0xa
    for bytes in &[
        vec![0x7a, 0x00],
        vec![0x7b, 0x00],
        vec![0x0f, 0x8a, 0x00, 0x00, 0x00, 0x00],
        vec![0x0f, 0x9b, 0xc0],
    ] {
        match X86::new().lift(bytes.as_slice(), 0) {
            Err(Error(ErrorKind::UnsupportedOpcode(_, _), _)) => {}
            other => panic!("expected UnsupportedOpcode, got {:?}", other.is_ok()),
        }
    }
}

#[test]
fn through_carry_rotates_unsupported() {
    // rcl eax, 1 and rcr eax, imm8
    for bytes in &[vec![0xd1, 0xd0], vec![0xc1, 0xd8, 0x02]] {
        match X86::new().lift(bytes.as_slice(), 0) {
            Err(Error(ErrorKind::UnsupportedOpcode(_, _), _)) => {}
            other => panic!("expected UnsupportedOpcode, got {:?}", other.is_ok()),
        }
    }
}

#[test]
fn single_operand_imul_unsupported() {
    match X86::new().lift(&[0xf7, 0xe8][..], 0) {
        Err(Error(ErrorKind::UnsupportedOpcode(_, _), _)) => {}
        other => panic!("expected UnsupportedOpcode, got {:?}", other.is_ok()),
    }
}

#[test]
fn invalid_group_encoding() {
    // f6 /1 is a reserved encoding
    match X86::new().lift(&[0xf6, 0xc8, 0x01][..], 0) {
        Err(Error(ErrorKind::InvalidEncoding(_), _)) => {}
        other => panic!("expected InvalidEncoding, got {:?}", other.is_ok()),
    }
}

#[test]
fn unsupported_error_carries_bytes() {
    // prefix bytes and opcode bytes are both reported
    match X86::new().lift(&[0x66, 0x64, 0x0f, 0x37][..], 0) {
        Err(Error(ErrorKind::UnsupportedOpcode(prefix_bytes, opcode_bytes), _)) => {
            assert_eq!(prefix_bytes, vec![0x66, 0x64]);
            assert_eq!(opcode_bytes, vec![0x0f, 0x37]);
        }
        other => panic!("expected UnsupportedOpcode, got {:?}", other.is_ok()),
    }
}

#[test]
fn subregister_writes_preserve_bits() {
    // mov al, 0x42
    let mut state = State::new();
    state.set("eax", 0xaabb_ccdd, 32);
    run(&[0xb0, 0x42], &mut state);
    assert_eq!(state.get("eax"), 0xaabb_cc42);

    // mov ah, 0x42
    let mut state = State::new();
    state.set("eax", 0xaabb_ccdd, 32);
    run(&[0xb4, 0x42], &mut state);
    assert_eq!(state.get("eax"), 0xaabb_42dd);

    // mov ax, 0x4242
    let mut state = State::new();
    state.set("eax", 0xaabb_ccdd, 32);
    run(&[0x66, 0xb8, 0x42, 0x42], &mut state);
    assert_eq!(state.get("eax"), 0xaabb_4242);
}

#[test]
fn subregister_reads() {
    // add bl, ah reads bits 15..8 of eax
    let mut state = State::new();
    state.set("eax", 0x0000_5500, 32);
    state.set("ebx", 0x0000_0001, 32);
    run(&[0x00, 0xe3], &mut state);
    assert_eq!(state.get("ebx"), 0x56);
}

#[test]
fn flag_idempotence() {
    // lifting and executing the same flag-setting instruction twice from the
    // same inputs yields identical flags
    let mut first = State::new();
    first.set("eax", 0x8000_0000, 32);
    first.set("ebx", 0x8000_0000, 32);
    run(&[0x01, 0xd8], &mut first);
    let mut second = first.clone();
    second.set("eax", 0x8000_0000, 32);
    second.set("ebx", 0x8000_0000, 32);
    run(&[0x01, 0xd8], &mut second);
    for flag in &["CF", "PF", "ZF", "SF", "OF"] {
        assert_eq!(first.get(flag), second.get(flag), "{} diverged", flag);
    }
}

#[test]
fn determinism() {
    for bytes in CORPUS {
        let first = lift(bytes);
        let second = lift(bytes);
        assert_eq!(first.statements(), second.statements());
        assert_eq!(first.next_address(), second.next_address());
    }
}

#[test]
fn instruction_lengths() {
    let lengths: &[(&[u8], u64)] = &[
        (&[0x90], 1),
        (&[0xb8, 0x2a, 0x00, 0x00, 0x00], 5),
        (&[0x83, 0xc0, 0x01], 3),
        (&[0x29, 0xc0], 2),
        (&[0xf3, 0xa4], 2),
        (&[0xc3], 1),
        (&[0x66, 0x01, 0xd8], 3),
        (&[0x67, 0x8b, 0x07], 3),
        (&[0x8b, 0x04, 0x8b], 3),
        (&[0x8b, 0x84, 0x8b, 0x44, 0x33, 0x22, 0x11], 7),
        (&[0x8b, 0x05, 0x44, 0x33, 0x22, 0x11], 6),
        (&[0xc2, 0x08, 0x00], 3),
        (&[0x0f, 0x84, 0x10, 0x00, 0x00, 0x00], 6),
        (&[0x66, 0x0f, 0x70, 0xc8, 0x1b], 5),
        (&[0x0f, 0x3a, 0x0f, 0xca, 0x04], 5),
        (&[0x64, 0xa1, 0x10, 0x00, 0x00, 0x00], 6),
        (&[0x66, 0xb8, 0x42, 0x42], 4),
        (&[0x0f, 0x1f, 0x40, 0x00], 4),
    ];
    for (bytes, length) in lengths {
        let result = lift(bytes);
        assert_eq!(
            result.next_address() - result.address(),
            *length,
            "length of {:02x?}",
            bytes
        );
    }
}

#[test]
fn width_consistency() {
    for bytes in CORPUS {
        let result = lift(bytes);
        for statement in result.statements() {
            validate_statement(statement);
        }
    }
}

#[test]
fn labels_prefix_every_instruction() {
    let result = lift(&[0x29, 0xc0]);
    let statements = result.statements();
    match statements[0].operation() {
        Operation::Label {
            label: Label::Address(address),
        } => assert_eq!(*address, 0),
        other => panic!("expected address label, got {}", other),
    }
    assert!(statements[0]
        .attributes()
        .iter()
        .any(|attribute| matches!(attribute, Attribute::Asm(_))));
    match statements[1].operation() {
        Operation::Label {
            label: Label::Name(name),
        } => assert_eq!(name, "pc_0x0"),
        other => panic!("expected name label, got {}", other),
    }
}

#[test]
fn segment_override_applies_to_moffs() {
    // mov eax, fs:[0x10]
    let mut state = State::new();
    state.set("fs_base", 0x1000, 32);
    state.set_memory(0x1010, &[0x78, 0x56, 0x34, 0x12]);
    run(&[0x64, 0xa1, 0x10, 0x00, 0x00, 0x00], &mut state);
    assert_eq!(state.get("eax"), 0x1234_5678);
}

#[test]
fn segment_override_last_wins() {
    let result = lift(&[0x64, 0x65, 0xa1, 0x10, 0x00, 0x00, 0x00]);
    let reads: Vec<String> = result
        .statements()
        .iter()
        .flat_map(|statement| statement.variables_read())
        .map(|variable| variable.name().to_string())
        .collect();
    assert!(reads.iter().any(|name| name == "gs_base"));
    assert!(!reads.iter().any(|name| name == "fs_base"));
}

#[test]
fn sib_scaled_index() {
    // mov eax, [ebx + ecx*4]
    let mut state = State::new();
    state.set("ebx", 0x100, 32);
    state.set("ecx", 3, 32);
    state.set_memory(0x10c, &[0x2a, 0x00, 0x00, 0x00]);
    run(&[0x8b, 0x04, 0x8b], &mut state);
    assert_eq!(state.get("eax"), 42);
}

#[test]
fn sib_with_disp32() {
    // mov eax, [ebx + ecx*4 + 0x11223344]
    let mut state = State::new();
    state.set("ebx", 0x100, 32);
    state.set("ecx", 2, 32);
    state.set_memory(0x1122_344c, &[0x2a, 0x00, 0x00, 0x00]);
    run(&[0x8b, 0x84, 0x8b, 0x44, 0x33, 0x22, 0x11], &mut state);
    assert_eq!(state.get("eax"), 42);
}

#[test]
fn disp8_is_sign_extended() {
    // mov eax, [ebx - 4]
    let mut state = State::new();
    state.set("ebx", 0x104, 32);
    state.set_memory(0x100, &[0x2a, 0x00, 0x00, 0x00]);
    run(&[0x8b, 0x43, 0xfc], &mut state);
    assert_eq!(state.get("eax"), 42);
}

#[test]
fn sixteen_bit_effective_address() {
    // mov eax, [bx + si] under the address-size override; the sum wraps at
    // 16 bits
    let mut state = State::new();
    state.set("ebx", 0xffff_fff0, 32);
    state.set("esi", 0x20, 32);
    state.set_memory(0x10, &[0x2a, 0x00, 0x00, 0x00]);
    run(&[0x67, 0x8b, 0x00], &mut state);
    assert_eq!(state.get("eax"), 42);
}

#[test]
fn lea_does_not_access_memory() {
    // lea ecx, [eax - 3]
    let mut state = State::new();
    state.set("eax", 0x100, 32);
    let result = lift(&[0x8d, 0x48, 0xfd]);
    execute(result.statements(), &mut state);
    assert_eq!(state.get("ecx"), 0xfd);
    assert!(!result.statements().iter().any(|statement| {
        match statement.operation() {
            Operation::Assign { src, .. } => matches!(src, Expression::Load { .. }),
            _ => false,
        }
    }));
}

#[test]
fn conditional_jump_taken_and_not() {
    // jz +0x10
    let bytes = &[0x0f, 0x84, 0x10, 0x00, 0x00, 0x00];
    let mut state = State::new();
    state.set("ZF", 1, 1);
    assert_eq!(run(bytes, &mut state), Some(0x16));
    let mut state = State::new();
    assert_eq!(run(bytes, &mut state), Some(0x6));
}

#[test]
fn setcc() {
    // sete al
    let mut state = State::new();
    state.set("eax", 0xffff_ffff, 32);
    state.set("ZF", 1, 1);
    run(&[0x0f, 0x94, 0xc0], &mut state);
    assert_eq!(state.get("eax"), 0xffff_ff01);
}

#[test]
fn shl_flags() {
    // shl eax, 1 out of the sign bit
    let mut state = State::new();
    state.set("eax", 0x8000_0000, 32);
    run(&[0xd1, 0xe0], &mut state);
    assert_eq!(state.get("eax"), 0);
    assert_eq!(state.get("CF"), 1);
    assert_eq!(state.get("ZF"), 1);
    // of for a 1-bit left shift is high(result) xor cf
    assert_eq!(state.get("OF"), 1);
}

#[test]
fn shift_count_zero_preserves_flags() {
    let mut state = State::new();
    state.set("eax", 0x1234, 32);
    state.set("CF", 1, 1);
    state.set("ZF", 1, 1);
    state.set("OF", 1, 1);
    run(&[0xc1, 0xe0, 0x00], &mut state);
    assert_eq!(state.get("eax"), 0x1234);
    assert_eq!(state.get("CF"), 1);
    assert_eq!(state.get("ZF"), 1);
    assert_eq!(state.get("OF"), 1);
}

#[test]
fn shift_count_masked_to_31() {
    // shr eax, cl with cl = 33 shifts by 1
    let mut state = State::new();
    state.set("eax", 0x4, 32);
    state.set("ecx", 33, 32);
    run(&[0xd3, 0xe8], &mut state);
    assert_eq!(state.get("eax"), 0x2);
}

#[test]
fn sar_is_arithmetic() {
    // sar eax, 4
    let mut state = State::new();
    state.set("eax", 0x8000_0000, 32);
    run(&[0xc1, 0xf8, 0x04], &mut state);
    assert_eq!(state.get("eax"), 0xf800_0000);
}

#[test]
fn shld() {
    // shld eax, ebx, 4
    let mut state = State::new();
    state.set("eax", 0x1234_5678, 32);
    state.set("ebx", 0x9abc_def0, 32);
    run(&[0x0f, 0xa4, 0xd8, 0x04], &mut state);
    assert_eq!(state.get("eax"), 0x2345_6789);
    assert_eq!(state.get("CF"), 1);
}

#[test]
fn inc_preserves_cf() {
    let mut state = State::new();
    state.set("eax", 0xffff_ffff, 32);
    state.set("CF", 1, 1);
    run(&[0x40], &mut state);
    assert_eq!(state.get("eax"), 0);
    assert_eq!(state.get("ZF"), 1);
    assert_eq!(state.get("CF"), 1);
}

#[test]
fn div_and_mul() {
    // div ebx: edx:eax / ebx
    let mut state = State::new();
    state.set("eax", 100, 32);
    state.set("edx", 0, 32);
    state.set("ebx", 7, 32);
    run(&[0xf7, 0xf3], &mut state);
    assert_eq!(state.get("eax"), 14);
    assert_eq!(state.get("edx"), 2);

    // mul ebx: edx:eax = eax * ebx
    let mut state = State::new();
    state.set("eax", 0x8000_0000, 32);
    state.set("ebx", 4, 32);
    run(&[0xf7, 0xe3], &mut state);
    assert_eq!(state.get("eax"), 0);
    assert_eq!(state.get("edx"), 2);
    assert_eq!(state.get("CF"), 1);
    assert_eq!(state.get("OF"), 1);
    assert!(state.is_havoc("ZF"));
}

#[test]
fn imul_product_and_unknown_flags() {
    let mut state = State::new();
    state.set("eax", 6, 32);
    state.set("ebx", 7, 32);
    run(&[0x0f, 0xaf, 0xc3], &mut state);
    assert_eq!(state.get("eax"), 42);
    for flag in &["CF", "PF", "AF", "ZF", "SF", "OF"] {
        assert!(state.is_havoc(flag), "{} should be havoc", flag);
    }
}

#[test]
fn movzx_movsx() {
    let mut state = State::new();
    state.set("ebx", 0xff, 32);
    run(&[0x0f, 0xb6, 0xc3], &mut state);
    assert_eq!(state.get("eax"), 0xff);

    // movsx eax, bh
    let mut state = State::new();
    state.set("ebx", 0x8000, 32);
    run(&[0x0f, 0xbe, 0xc7], &mut state);
    assert_eq!(state.get("eax"), 0xffff_ff80);
}

#[test]
fn bsf() {
    let mut state = State::new();
    state.set("ebx", 0x8, 32);
    run(&[0x0f, 0xbc, 0xc3], &mut state);
    assert_eq!(state.get("eax"), 3);
    assert_eq!(state.get("ZF"), 0);

    // a zero source leaves the destination havoc and sets zf
    let mut state = State::new();
    state.set("eax", 7, 32);
    run(&[0x0f, 0xbc, 0xc3], &mut state);
    assert_eq!(state.get("ZF"), 1);
    assert!(state.is_havoc("eax"));
}

#[test]
fn cmpxchg() {
    // cmpxchg ecx, ebx with eax == ecx
    let mut state = State::new();
    state.set("eax", 5, 32);
    state.set("ecx", 5, 32);
    state.set("ebx", 9, 32);
    run(&[0x0f, 0xb1, 0xd9], &mut state);
    assert_eq!(state.get("ZF"), 1);
    assert_eq!(state.get("ecx"), 9);
    assert_eq!(state.get("eax"), 5);

    // mismatch loads the destination into eax
    let mut state = State::new();
    state.set("eax", 4, 32);
    state.set("ecx", 5, 32);
    state.set("ebx", 9, 32);
    run(&[0x0f, 0xb1, 0xd9], &mut state);
    assert_eq!(state.get("ZF"), 0);
    assert_eq!(state.get("ecx"), 5);
    assert_eq!(state.get("eax"), 5);
}

#[test]
fn cmpxchg8b() {
    let mut state = State::new();
    state.set("ebx", 0x100, 32);
    // 0f c7 0b -> cmpxchg8b [ebx]
    state.set_memory(0x100, &[1, 0, 0, 0, 2, 0, 0, 0]);
    state.set("eax", 1, 32);
    state.set("edx", 2, 32);
    state.set("ecx", 0xcc, 32);
    state.set("ebx", 0x100, 32);
    // replacement is ecx:ebx; here ebx doubles as the address register
    run(&[0x0f, 0xc7, 0x0b], &mut state);
    assert_eq!(state.get("ZF"), 1);
    assert_eq!(state.get_memory(0x100), 0x00);
    assert_eq!(state.get_memory(0x104), 0xcc);
}

#[test]
fn xadd() {
    let mut state = State::new();
    state.set("eax", 3, 32);
    state.set("ebx", 4, 32);
    // xadd eax, ebx
    run(&[0x0f, 0xc1, 0xd8], &mut state);
    assert_eq!(state.get("eax"), 7);
    assert_eq!(state.get("ebx"), 3);
}

#[test]
fn xchg() {
    let mut state = State::new();
    state.set("eax", 1, 32);
    state.set("ebx", 2, 32);
    run(&[0x93], &mut state);
    assert_eq!(state.get("eax"), 2);
    assert_eq!(state.get("ebx"), 1);
}

#[test]
fn repnz_scasb() {
    // scan for al until found
    let mut state = State::new();
    state.set("eax", 0x43, 32);
    state.set("edi", 0x200, 32);
    state.set("ecx", 10, 32);
    state.set_memory(0x200, &[0x41, 0x42, 0x43, 0x44]);
    let exit = run(&[0xf2, 0xae], &mut state);
    assert_eq!(exit, Some(2));
    assert_eq!(state.get("edi"), 0x203);
    assert_eq!(state.get("ecx"), 7);
    assert_eq!(state.get("ZF"), 1);
}

#[test]
fn cld_std_direction() {
    let mut state = State::new();
    run(&[0xfd], &mut state);
    assert_eq!(state.get("DFLAG"), 0xffff_ffff);

    // std then movsb walks the pointers backward
    state.set("esi", 0x102, 32);
    state.set("edi", 0x202, 32);
    state.set_memory(0x102, &[0x55]);
    run(&[0xa4], &mut state);
    assert_eq!(state.get_memory(0x202), 0x55);
    assert_eq!(state.get("esi"), 0x101);
    assert_eq!(state.get("edi"), 0x201);

    run(&[0xfc], &mut state);
    assert_eq!(state.get("DFLAG"), 1);
}

#[test]
fn pushf_popf_round_trip() {
    let mut state = State::new();
    state.set("esp", 0x1000, 32);
    state.set("CF", 1, 1);
    state.set("ZF", 1, 1);
    state.set("OF", 1, 1);
    run(&[0x9c], &mut state);
    assert_eq!(state.get("esp"), 0xffc);

    state.set("CF", 0, 1);
    state.set("ZF", 0, 1);
    state.set("OF", 0, 1);
    run(&[0x9d], &mut state);
    assert_eq!(state.get("esp"), 0x1000);
    assert_eq!(state.get("CF"), 1);
    assert_eq!(state.get("ZF"), 1);
    assert_eq!(state.get("OF"), 1);
    assert_eq!(state.get("DFLAG"), 1);
}

#[test]
fn lahf_sahf_round_trip() {
    let mut state = State::new();
    state.set("CF", 1, 1);
    state.set("SF", 1, 1);
    run(&[0x9f], &mut state);
    // bit 1 is always set in the packed form
    assert_eq!(state.get("eax") & 0xff00, 0x8300);

    state.set("CF", 0, 1);
    state.set("SF", 0, 1);
    run(&[0x9e], &mut state);
    assert_eq!(state.get("CF"), 1);
    assert_eq!(state.get("SF"), 1);
}

#[test]
fn leave() {
    let mut state = State::new();
    state.set("ebp", 0x1000, 32);
    state.set("esp", 0x800, 32);
    state.set_memory(0x1000, &[0x00, 0x20, 0x00, 0x00]);
    run(&[0xc9], &mut state);
    assert_eq!(state.get("esp"), 0x1004);
    assert_eq!(state.get("ebp"), 0x2000);
}

#[test]
fn cwde_cdq() {
    let mut state = State::new();
    state.set("eax", 0x8000, 32);
    run(&[0x98], &mut state);
    assert_eq!(state.get("eax"), 0xffff_8000);

    run(&[0x99], &mut state);
    assert_eq!(state.get("edx"), 0xffff_ffff);
}

#[test]
fn hlt_branches_to_fault_label() {
    let result = lift(&[0xf4]);
    assert!(result.statements().iter().any(|statement| {
        match statement.operation() {
            Operation::Branch { target } => {
                matches!(target, Expression::Lab(name) if name == "General_protection_fault")
            }
            _ => false,
        }
    }));
}

#[test]
fn int_and_sysenter_are_intrinsics() {
    let result = lift(&[0xcd, 0x80]);
    assert!(result.statements().iter().any(|statement| {
        matches!(statement.operation(), Operation::Intrinsic { name } if name == "int 0x80")
    }));

    let result = lift(&[0x0f, 0x34]);
    assert!(result.statements().iter().any(|statement| {
        matches!(statement.operation(), Operation::Intrinsic { name } if name == "syscall")
    }));
}

#[test]
fn cpuid_rdtsc_havoc_destinations() {
    let mut state = State::new();
    state.set("eax", 1, 32);
    run(&[0x0f, 0xa2], &mut state);
    for name in &["eax", "ebx", "ecx", "edx"] {
        assert!(state.is_havoc(name));
    }

    let mut state = State::new();
    run(&[0x0f, 0x31], &mut state);
    assert!(state.is_havoc("eax"));
    assert!(state.is_havoc("edx"));
    assert!(!state.is_havoc("ebx"));
}

#[test]
fn simd_structural() {
    // the 128-bit operations are asserted structurally; the test evaluator
    // is 64-bit
    for bytes in &[
        vec![0x66, 0x0f, 0xef, 0xc1],
        vec![0x66, 0x0f, 0x6f, 0xc1],
        vec![0xf3, 0x0f, 0x6f, 0xc1],
        vec![0x0f, 0x28, 0xc1],
        vec![0x66, 0x0f, 0x76, 0xc1],
        vec![0x66, 0x0f, 0x70, 0xc8, 0x1b],
        vec![0x66, 0x0f, 0xd7, 0xd4],
        vec![0x66, 0x0f, 0x6e, 0xc3],
        vec![0x66, 0x0f, 0x3a, 0x0f, 0xca, 0x04],
    ] {
        let result = X86::new().lift(bytes.as_slice(), 0).unwrap();
        assert!(
            result
                .statements()
                .iter()
                .any(|statement| statement.is_assign()),
            "{:02x?} emitted no effect",
            bytes
        );
        for statement in result.statements() {
            validate_statement(statement);
        }
    }
}

#[test]
fn pshufw_on_mm() {
    // pshufw mm1, mm0, 0x1b reverses the four 16-bit lanes
    let mut state = State::new();
    state.set("mm0", 0x1111_2222_3333_4444, 64);
    run(&[0x0f, 0x70, 0xc8, 0x1b], &mut state);
    assert_eq!(state.get("mm1"), 0x4444_3333_2222_1111);
}

#[test]
fn pxor_on_mm() {
    let mut state = State::new();
    state.set("mm0", 0xff00_ff00_ff00_ff00, 64);
    state.set("mm1", 0x0ff0_0ff0_0ff0_0ff0, 64);
    // pxor mm0, mm1
    run(&[0x0f, 0xef, 0xc1], &mut state);
    assert_eq!(state.get("mm0"), 0xf0f0_f0f0_f0f0_f0f0);
}

#[test]
fn pmovmskb_on_mm() {
    let mut state = State::new();
    state.set("mm4", 0x80ff_0000_8000_0080, 64);
    // pmovmskb edx, mm4
    run(&[0x0f, 0xd7, 0xd4], &mut state);
    assert_eq!(state.get("edx"), 0b1100_1001);
}

#[test]
fn mxcsr_and_fpu_control() {
    let mut state = State::new();
    state.set("ebx", 0x100, 32);
    state.set_memory(0x100, &[0x80, 0x1f, 0x00, 0x00]);
    // ldmxcsr [ebx]
    run(&[0x0f, 0xae, 0x13], &mut state);
    assert_eq!(state.get("mxcsr"), 0x1f80);

    // fnstcw [ebx]
    state.set("fpu_control", 0x037f, 16);
    run(&[0xd9, 0x3b], &mut state);
    assert_eq!(state.get_memory(0x100), 0x7f);
    assert_eq!(state.get_memory(0x101), 0x03);
}

#[test]
fn run_small_program() {
    // mov eax, 5; add eax, 3; push eax; pop ebx; ret
    let program = [
        0xb8, 0x05, 0x00, 0x00, 0x00, // mov eax, 5
        0x83, 0xc0, 0x03, // add eax, 3
        0x50, // push eax
        0x5b, // pop ebx
        0xc3, // ret
    ];
    let mut state = State::new();
    state.set("esp", 0x1000, 32);
    state.set_memory(0x1000, &[0x00, 0x00, 0x40, 0x00]);
    let exit = run_program(&program, &mut state);
    assert_eq!(exit, Some(0x40_0000));
    assert_eq!(state.get("eax"), 8);
    assert_eq!(state.get("ebx"), 8);
    assert_eq!(state.get("esp"), 0x1004);
}

#[test]
fn serde_round_trip() {
    let result = lift(&[0x83, 0xc0, 0x01]);
    let json = serde_json::to_string(result.statements()).unwrap();
    let parsed: Vec<Statement> = serde_json::from_str(&json).unwrap();
    assert_eq!(result.statements(), parsed.as_slice());
}

#[test]
fn variable_table() {
    let variables = crate::translator::x86::variables();
    for name in &["eax", "esp", "eip", "CF", "OF", "DFLAG", "fs_base", "xmm0", "mm7", "fpu_control", "mxcsr", "cc_op", "mem"] {
        assert!(
            variables.iter().any(|variable| variable.name() == *name),
            "{} missing from the variable table",
            name
        );
    }
    let mem = variables
        .iter()
        .find(|variable| variable.name() == "mem")
        .unwrap();
    assert_eq!(mem.sort(), Type::Mem(32));
}

#[test]
fn prefix_repz_repnz_last_wins() {
    // f3 f2 ae is repnz scasb
    let mut state = State::new();
    state.set("eax", 0x43, 32);
    state.set("edi", 0x200, 32);
    state.set("ecx", 4, 32);
    state.set_memory(0x200, &[0x41, 0x43]);
    let exit = run(&[0xf3, 0xf2, 0xae], &mut state);
    assert_eq!(exit, Some(3));
    assert_eq!(state.get("ecx"), 2);
    assert_eq!(state.get("ZF"), 1);
}

#[test]
fn lock_prefix_is_discarded() {
    // lock add [ebx], eax lifts like the unlocked form
    let mut state = State::new();
    state.set("ebx", 0x100, 32);
    state.set("eax", 2, 32);
    state.set_memory(0x100, &[40, 0, 0, 0]);
    run(&[0xf0, 0x01, 0x03], &mut state);
    assert_eq!(state.get_memory(0x100), 42);
}

#[test]
fn operand_size_override() {
    // add ax, bx leaves the high half of eax alone
    let mut state = State::new();
    state.set("eax", 0xaaaa_fffe, 32);
    state.set("ebx", 0x0000_0003, 32);
    run(&[0x66, 0x01, 0xd8], &mut state);
    assert_eq!(state.get("eax"), 0xaaaa_0001);
    assert_eq!(state.get("CF"), 1);
}
