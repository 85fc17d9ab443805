/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::command::CommandLine;
use crate::files::FileTable;
use crate::host::HostStreams;
use crate::memory::Memory;
use crate::var_ref::VarRefList;
use crate::VmState::Normal;
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::opcode::OpCode;
use p6_vm_types::{mark, Address, STORE_CAPACITY};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use tracing::{debug, error};

mod access;
mod arith;
mod check;
pub mod command;
mod compare;
mod control;
pub mod deck;
pub mod files;
pub mod format;
mod frame;
mod guard;
pub mod heap;
pub mod host;
pub mod memory;
pub mod prelude;
pub mod set;
mod sp;
mod stack;
mod text;
mod var_ref;

type Handler0 = fn(&mut Vm) -> VmResult;
type HandlerByte = fn(&mut Vm, u8) -> VmResult;
type HandlerQ = fn(&mut Vm, Address) -> VmResult;
type HandlerPQ = fn(&mut Vm, u8, Address) -> VmResult;
type HandlerQQ = fn(&mut Vm, Address, Address) -> VmResult;
type HandlerQQQ = fn(&mut Vm, Address, Address, Address) -> VmResult;

#[derive(Copy, Clone)]
enum HandlerType {
    Args0(Handler0),
    /// A literal byte operand. Does not touch the `p` register.
    Byte(HandlerByte),
    P(HandlerByte),
    Q(HandlerQ),
    PQ(HandlerPQ),
    QQ(HandlerQQ),
    QQQ(HandlerQQQ),
}

/// Why an instruction did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Delivered to the innermost guarded block, if any.
    Exception(ExceptionCode),
    /// An explicitly thrown address-sized value.
    Thrown(Address),
    Fatal(FatalCode),
    /// A failed assertion carrying a program supplied message.
    Assertion(String),
    Halt,
}

impl From<ExceptionCode> for Fault {
    fn from(code: ExceptionCode) -> Self {
        Self::Exception(code)
    }
}

impl From<FatalCode> for Fault {
    fn from(code: FatalCode) -> Self {
        Self::Fatal(code)
    }
}

pub type VmResult<T = ()> = Result<T, Fault>;

/// The reason a run ended with an error.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum TrapCode {
    Unhandled(ExceptionCode),
    Fatal(FatalCode),
}

impl TrapCode {
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Unhandled(code) => code.message(),
            Self::Fatal(code) => code.message(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Unhandled(code) => code.code(),
            Self::Fatal(code) => code.code(),
        }
    }
}

impl Display for TrapCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "trap {}: {}", self.code(), self.message())
    }
}

#[derive(Eq, Debug, PartialEq)]
pub enum VmState {
    Normal,
    /// The stop instruction was executed.
    Stopped,
    Panic(String),
    Trap(TrapCode),
    Halt,
}

#[derive(Debug, Default)]
pub struct Debug {
    pub opcodes_executed: usize,
    pub max_call_depth: usize,
    pub lowest_stack_pointer: Address,
}

/// Runtime checks. All of them are on by default, except the ones that trade
/// heap space for use-after-dispose detection.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CheckFlags {
    pub check_overflow: bool,
    pub check_defined: bool,
    /// Return disposed blocks to the free list.
    pub recycle: bool,
    /// Keep a freed marker for every disposed block and check pointers against it.
    pub check_reuse: bool,
    /// Never recycle disposed blocks, even partially.
    pub no_recycle_partial: bool,
    pub iso7185: bool,
}

impl Default for CheckFlags {
    fn default() -> Self {
        Self {
            check_overflow: true,
            check_defined: true,
            recycle: true,
            check_reuse: false,
            no_recycle_partial: false,
            iso7185: false,
        }
    }
}

impl CheckFlags {
    /// Disposal leaves freed markers behind instead of coalescing.
    #[must_use]
    pub const fn strict_dispose(&self) -> bool {
        self.check_reuse || self.no_recycle_partial
    }
}

pub struct VmSetup {
    pub checks: CheckFlags,
    pub command_line: CommandLine,
    pub prd_path: PathBuf,
    pub prr_path: PathBuf,
    pub streams: HostStreams,
    pub debug_stats_enabled: bool,
    pub debug_opcodes_enabled: bool,
}

impl Default for VmSetup {
    fn default() -> Self {
        Self {
            checks: CheckFlags::default(),
            command_line: CommandLine::default(),
            prd_path: PathBuf::from("prd"),
            prr_path: PathBuf::from("prr"),
            streams: HostStreams::default(),
            debug_stats_enabled: false,
            debug_opcodes_enabled: false,
        }
    }
}

pub struct Vm {
    memory: Memory,
    handlers: [HandlerType; 256],

    // Registers
    pub(crate) pc: Address,
    pub(crate) pctop: Address,
    pub(crate) gbtop: Address,
    pub(crate) np: Address,
    pub(crate) sp: Address,
    pub(crate) mp: Address,
    pub(crate) ep: Address,
    pub(crate) expadr: Address,
    pub(crate) expstk: Address,
    pub(crate) expmrk: Address,
    /// Last `p` operand decoded. Calls through a vector reuse it.
    pub(crate) p: u8,
    pub(crate) source_line: Address,

    pub(crate) checks: CheckFlags,
    pub(crate) var_refs: VarRefList,
    pub(crate) files: FileTable,
    pub(crate) command: CommandLine,

    execution_complete: bool,
    pub debug: Debug,
    pub debug_stats_enabled: bool,
    pub debug_opcodes_enabled: bool,
    pub state: VmState,
}

impl Vm {
    #[must_use]
    pub const fn is_execution_complete(&self) -> bool {
        self.execution_complete
    }
}

impl Vm {
    #[allow(clippy::too_many_lines)]
    #[must_use]
    pub fn new(setup: VmSetup) -> Self {
        let mut vm = Self {
            memory: Memory::new(setup.checks.check_defined),
            handlers: [HandlerType::Args0(Self::execute_invalid); 256],
            pc: 0,
            pctop: 0,
            gbtop: 0,
            np: -1,
            sp: STORE_CAPACITY,
            mp: STORE_CAPACITY,
            ep: 5,
            expadr: 0,
            expstk: 0,
            expmrk: 0,
            p: 0,
            source_line: 1,
            checks: setup.checks,
            var_refs: VarRefList::default(),
            files: FileTable::new(setup.streams, setup.prd_path, setup.prr_path),
            command: setup.command_line,
            execution_complete: false,
            debug: Debug {
                opcodes_executed: 0,
                max_call_depth: 0,
                lowest_stack_pointer: STORE_CAPACITY,
            },
            debug_stats_enabled: setup.debug_stats_enabled,
            debug_opcodes_enabled: setup.debug_opcodes_enabled,
            state: Normal,
        };

        // Load
        vm.handlers[OpCode::Lodi as usize] = HandlerType::PQ(Self::execute_lodi);
        vm.handlers[OpCode::Lodx as usize] = HandlerType::PQ(Self::execute_lodx);
        vm.handlers[OpCode::Loda as usize] = HandlerType::PQ(Self::execute_loda);
        vm.handlers[OpCode::Lodr as usize] = HandlerType::PQ(Self::execute_lodr);
        vm.handlers[OpCode::Lods as usize] = HandlerType::PQ(Self::execute_lods);
        vm.handlers[OpCode::Lodb as usize] = HandlerType::PQ(Self::execute_lodb);
        vm.handlers[OpCode::Lodc as usize] = HandlerType::PQ(Self::execute_lodc);

        vm.handlers[OpCode::Ldoi as usize] = HandlerType::Q(Self::execute_ldoi);
        vm.handlers[OpCode::Ldox as usize] = HandlerType::Q(Self::execute_ldox);
        vm.handlers[OpCode::Ldoa as usize] = HandlerType::Q(Self::execute_ldoa);
        vm.handlers[OpCode::Ldor as usize] = HandlerType::Q(Self::execute_ldor);
        vm.handlers[OpCode::Ldos as usize] = HandlerType::Q(Self::execute_ldos);
        vm.handlers[OpCode::Ldob as usize] = HandlerType::Q(Self::execute_ldob);
        vm.handlers[OpCode::Ldoc as usize] = HandlerType::Q(Self::execute_ldoc);

        // Store
        vm.handlers[OpCode::Stri as usize] = HandlerType::PQ(Self::execute_stri);
        vm.handlers[OpCode::Strx as usize] = HandlerType::PQ(Self::execute_strx);
        vm.handlers[OpCode::Stra as usize] = HandlerType::PQ(Self::execute_stra);
        vm.handlers[OpCode::Strr as usize] = HandlerType::PQ(Self::execute_strr);
        vm.handlers[OpCode::Strs as usize] = HandlerType::PQ(Self::execute_strs);
        vm.handlers[OpCode::Strb as usize] = HandlerType::PQ(Self::execute_strb);
        vm.handlers[OpCode::Strc as usize] = HandlerType::PQ(Self::execute_strc);

        vm.handlers[OpCode::Sroi as usize] = HandlerType::Q(Self::execute_sroi);
        vm.handlers[OpCode::Srox as usize] = HandlerType::Q(Self::execute_srox);
        vm.handlers[OpCode::Sroa as usize] = HandlerType::Q(Self::execute_sroa);
        vm.handlers[OpCode::Sror as usize] = HandlerType::Q(Self::execute_sror);
        vm.handlers[OpCode::Sros as usize] = HandlerType::Q(Self::execute_sros);
        vm.handlers[OpCode::Srob as usize] = HandlerType::Q(Self::execute_srob);
        vm.handlers[OpCode::Sroc as usize] = HandlerType::Q(Self::execute_sroc);

        vm.handlers[OpCode::Lda as usize] = HandlerType::PQ(Self::execute_lda);
        vm.handlers[OpCode::Lao as usize] = HandlerType::Q(Self::execute_lao);

        vm.handlers[OpCode::Stoi as usize] = HandlerType::Args0(Self::execute_stoi);
        vm.handlers[OpCode::Stox as usize] = HandlerType::Args0(Self::execute_stox);
        vm.handlers[OpCode::Stoa as usize] = HandlerType::Args0(Self::execute_stoa);
        vm.handlers[OpCode::Stor as usize] = HandlerType::Args0(Self::execute_stor);
        vm.handlers[OpCode::Stos as usize] = HandlerType::Args0(Self::execute_stos);
        vm.handlers[OpCode::Stob as usize] = HandlerType::Args0(Self::execute_stob);
        vm.handlers[OpCode::Stoc as usize] = HandlerType::Args0(Self::execute_stoc);

        // Constants
        vm.handlers[OpCode::Ldcc as usize] = HandlerType::Byte(Self::execute_ldc_byte);
        vm.handlers[OpCode::Ldcb as usize] = HandlerType::Byte(Self::execute_ldc_byte);
        vm.handlers[OpCode::Ldci as usize] = HandlerType::Q(Self::execute_ldci);
        vm.handlers[OpCode::Ldcn as usize] = HandlerType::Args0(Self::execute_ldcn);
        vm.handlers[OpCode::Ldcr as usize] = HandlerType::Q(Self::execute_ldcr);
        vm.handlers[OpCode::Ldcs as usize] = HandlerType::Q(Self::execute_ldos);
        vm.handlers[OpCode::Lca as usize] = HandlerType::Q(Self::execute_lao);

        // Indirect
        vm.handlers[OpCode::Indi as usize] = HandlerType::Q(Self::execute_indi);
        vm.handlers[OpCode::Indx as usize] = HandlerType::Q(Self::execute_indx);
        vm.handlers[OpCode::Inda as usize] = HandlerType::Q(Self::execute_inda);
        vm.handlers[OpCode::Indr as usize] = HandlerType::Q(Self::execute_indr);
        vm.handlers[OpCode::Inds as usize] = HandlerType::Q(Self::execute_inds);
        vm.handlers[OpCode::Indb as usize] = HandlerType::Q(Self::execute_indb);
        vm.handlers[OpCode::Indc as usize] = HandlerType::Q(Self::execute_indb);

        vm.handlers[OpCode::Inci as usize] = HandlerType::Q(Self::execute_inc);
        vm.handlers[OpCode::Incx as usize] = HandlerType::Q(Self::execute_inc);
        vm.handlers[OpCode::Incb as usize] = HandlerType::Q(Self::execute_inc);
        vm.handlers[OpCode::Incc as usize] = HandlerType::Q(Self::execute_inc);
        vm.handlers[OpCode::Inca as usize] = HandlerType::Q(Self::execute_inca);
        vm.handlers[OpCode::Deci as usize] = HandlerType::Q(Self::execute_dec);
        vm.handlers[OpCode::Decx as usize] = HandlerType::Q(Self::execute_dec);
        vm.handlers[OpCode::Decb as usize] = HandlerType::Q(Self::execute_dec);
        vm.handlers[OpCode::Decc as usize] = HandlerType::Q(Self::execute_dec);

        vm.handlers[OpCode::Ixa as usize] = HandlerType::Q(Self::execute_ixa);
        vm.handlers[OpCode::Mov as usize] = HandlerType::Q(Self::execute_mov);
        vm.handlers[OpCode::Pck as usize] = HandlerType::QQ(Self::execute_pck);
        vm.handlers[OpCode::Upk as usize] = HandlerType::QQ(Self::execute_upk);
        vm.handlers[OpCode::Inv as usize] = HandlerType::Args0(Self::execute_inv);

        vm.handlers[OpCode::Dupi as usize] = HandlerType::Args0(Self::execute_dupi);
        vm.handlers[OpCode::Dupb as usize] = HandlerType::Args0(Self::execute_dupi);
        vm.handlers[OpCode::Dupc as usize] = HandlerType::Args0(Self::execute_dupi);
        vm.handlers[OpCode::Dupa as usize] = HandlerType::Args0(Self::execute_dupa);
        vm.handlers[OpCode::Dupr as usize] = HandlerType::Args0(Self::execute_dupr);
        vm.handlers[OpCode::Dups as usize] = HandlerType::Args0(Self::execute_dups);

        // Conversions sharing a representation
        vm.handlers[OpCode::Ordi as usize] = HandlerType::Args0(Self::execute_nop);
        vm.handlers[OpCode::Ordb as usize] = HandlerType::Args0(Self::execute_nop);
        vm.handlers[OpCode::Ordc as usize] = HandlerType::Args0(Self::execute_nop);
        vm.handlers[OpCode::Ordx as usize] = HandlerType::Args0(Self::execute_nop);
        vm.handlers[OpCode::Chr as usize] = HandlerType::Args0(Self::execute_nop);
        vm.handlers[OpCode::Brk as usize] = HandlerType::Args0(Self::execute_nop);

        // Integer and real arithmetic
        vm.handlers[OpCode::Adi as usize] = HandlerType::Args0(Self::execute_adi);
        vm.handlers[OpCode::Adr as usize] = HandlerType::Args0(Self::execute_adr);
        vm.handlers[OpCode::Sbi as usize] = HandlerType::Args0(Self::execute_sbi);
        vm.handlers[OpCode::Sbr as usize] = HandlerType::Args0(Self::execute_sbr);
        vm.handlers[OpCode::Mpi as usize] = HandlerType::Args0(Self::execute_mpi);
        vm.handlers[OpCode::Mpr as usize] = HandlerType::Args0(Self::execute_mpr);
        vm.handlers[OpCode::Dvi as usize] = HandlerType::Args0(Self::execute_dvi);
        vm.handlers[OpCode::Dvr as usize] = HandlerType::Args0(Self::execute_dvr);
        vm.handlers[OpCode::Mod as usize] = HandlerType::Args0(Self::execute_mod);
        vm.handlers[OpCode::Ngi as usize] = HandlerType::Args0(Self::execute_ngi);
        vm.handlers[OpCode::Ngr as usize] = HandlerType::Args0(Self::execute_ngr);
        vm.handlers[OpCode::Sqi as usize] = HandlerType::Args0(Self::execute_sqi);
        vm.handlers[OpCode::Sqr as usize] = HandlerType::Args0(Self::execute_sqr);
        vm.handlers[OpCode::Abi as usize] = HandlerType::Args0(Self::execute_abi);
        vm.handlers[OpCode::Abr as usize] = HandlerType::Args0(Self::execute_abr);
        vm.handlers[OpCode::Odd as usize] = HandlerType::Args0(Self::execute_odd);
        vm.handlers[OpCode::Flt as usize] = HandlerType::Args0(Self::execute_flt);
        vm.handlers[OpCode::Flo as usize] = HandlerType::Args0(Self::execute_flo);
        vm.handlers[OpCode::Trc as usize] = HandlerType::Args0(Self::execute_trc);
        vm.handlers[OpCode::Rnd as usize] = HandlerType::Args0(Self::execute_rnd);

        // Boolean
        vm.handlers[OpCode::Notb as usize] = HandlerType::Args0(Self::execute_notb);
        vm.handlers[OpCode::Noti as usize] = HandlerType::Args0(Self::execute_noti);
        vm.handlers[OpCode::And as usize] = HandlerType::Args0(Self::execute_and);
        vm.handlers[OpCode::Ior as usize] = HandlerType::Args0(Self::execute_ior);
        vm.handlers[OpCode::Xor as usize] = HandlerType::Args0(Self::execute_xor);

        // Sets
        vm.handlers[OpCode::Sgs as usize] = HandlerType::Args0(Self::execute_sgs);
        vm.handlers[OpCode::Rgs as usize] = HandlerType::Args0(Self::execute_rgs);
        vm.handlers[OpCode::Dif as usize] = HandlerType::Args0(Self::execute_dif);
        vm.handlers[OpCode::Int as usize] = HandlerType::Args0(Self::execute_int);
        vm.handlers[OpCode::Uni as usize] = HandlerType::Args0(Self::execute_uni);
        vm.handlers[OpCode::Inn as usize] = HandlerType::Args0(Self::execute_inn);

        // Comparisons
        vm.handlers[OpCode::Equa as usize] = HandlerType::Args0(Self::execute_equa);
        vm.handlers[OpCode::Neqa as usize] = HandlerType::Args0(Self::execute_neqa);
        for op in [OpCode::Equi, OpCode::Equb, OpCode::Equc] {
            vm.handlers[op as usize] = HandlerType::Args0(Self::execute_equi);
        }
        for op in [OpCode::Neqi, OpCode::Neqb, OpCode::Neqc] {
            vm.handlers[op as usize] = HandlerType::Args0(Self::execute_neqi);
        }
        for op in [OpCode::Geqi, OpCode::Geqb, OpCode::Geqc] {
            vm.handlers[op as usize] = HandlerType::Args0(Self::execute_geqi);
        }
        for op in [OpCode::Grti, OpCode::Grtb, OpCode::Grtc] {
            vm.handlers[op as usize] = HandlerType::Args0(Self::execute_grti);
        }
        for op in [OpCode::Leqi, OpCode::Leqb, OpCode::Leqc] {
            vm.handlers[op as usize] = HandlerType::Args0(Self::execute_leqi);
        }
        for op in [OpCode::Lesi, OpCode::Lesb, OpCode::Lesc] {
            vm.handlers[op as usize] = HandlerType::Args0(Self::execute_lesi);
        }
        vm.handlers[OpCode::Equr as usize] = HandlerType::Args0(Self::execute_equr);
        vm.handlers[OpCode::Neqr as usize] = HandlerType::Args0(Self::execute_neqr);
        vm.handlers[OpCode::Geqr as usize] = HandlerType::Args0(Self::execute_geqr);
        vm.handlers[OpCode::Grtr as usize] = HandlerType::Args0(Self::execute_grtr);
        vm.handlers[OpCode::Leqr as usize] = HandlerType::Args0(Self::execute_leqr);
        vm.handlers[OpCode::Lesr as usize] = HandlerType::Args0(Self::execute_lesr);
        vm.handlers[OpCode::Equs as usize] = HandlerType::Args0(Self::execute_equs);
        vm.handlers[OpCode::Neqs as usize] = HandlerType::Args0(Self::execute_neqs);
        vm.handlers[OpCode::Geqs as usize] = HandlerType::Args0(Self::execute_geqs);
        vm.handlers[OpCode::Leqs as usize] = HandlerType::Args0(Self::execute_leqs);
        vm.handlers[OpCode::Grts as usize] = HandlerType::Args0(Self::execute_set_inclusion);
        vm.handlers[OpCode::Less as usize] = HandlerType::Args0(Self::execute_set_inclusion);
        vm.handlers[OpCode::Equm as usize] = HandlerType::Q(Self::execute_equm);
        vm.handlers[OpCode::Neqm as usize] = HandlerType::Q(Self::execute_neqm);
        vm.handlers[OpCode::Geqm as usize] = HandlerType::Q(Self::execute_geqm);
        vm.handlers[OpCode::Grtm as usize] = HandlerType::Q(Self::execute_grtm);
        vm.handlers[OpCode::Leqm as usize] = HandlerType::Q(Self::execute_leqm);
        vm.handlers[OpCode::Lesm as usize] = HandlerType::Q(Self::execute_lesm);

        // Control transfer
        vm.handlers[OpCode::Ujp as usize] = HandlerType::Q(Self::execute_ujp);
        vm.handlers[OpCode::Fjp as usize] = HandlerType::Q(Self::execute_fjp);
        vm.handlers[OpCode::Tjp as usize] = HandlerType::Q(Self::execute_tjp);
        vm.handlers[OpCode::Xjp as usize] = HandlerType::Q(Self::execute_xjp);
        vm.handlers[OpCode::Cjp as usize] = HandlerType::QQ(Self::execute_cjp);
        vm.handlers[OpCode::Ujc as usize] = HandlerType::Args0(Self::execute_ujc);
        vm.handlers[OpCode::Cal as usize] = HandlerType::Q(Self::execute_cal);
        vm.handlers[OpCode::Ret as usize] = HandlerType::Args0(Self::execute_ret);
        vm.handlers[OpCode::Stp as usize] = HandlerType::Args0(Self::execute_stp);
        vm.handlers[OpCode::Mrkl as usize] = HandlerType::Q(Self::execute_mrkl);
        vm.handlers[OpCode::Lnp as usize] = HandlerType::Q(Self::execute_lnp);

        // Marks, calls and returns
        vm.handlers[OpCode::Mst as usize] = HandlerType::P(Self::execute_mst);
        vm.handlers[OpCode::Cup as usize] = HandlerType::PQ(Self::execute_cup);
        vm.handlers[OpCode::Cuv as usize] = HandlerType::Q(Self::execute_cuv);
        vm.handlers[OpCode::Suv as usize] = HandlerType::QQ(Self::execute_suv);
        vm.handlers[OpCode::Cip as usize] = HandlerType::P(Self::execute_cip);
        vm.handlers[OpCode::Lpa as usize] = HandlerType::PQ(Self::execute_lpa);
        vm.handlers[OpCode::Lip as usize] = HandlerType::PQ(Self::execute_lip);
        vm.handlers[OpCode::Ipj as usize] = HandlerType::PQ(Self::execute_ipj);
        vm.handlers[OpCode::Ents as usize] = HandlerType::Q(Self::execute_ents);
        vm.handlers[OpCode::Ente as usize] = HandlerType::Q(Self::execute_ente);
        vm.handlers[OpCode::Retp as usize] = HandlerType::Args0(Self::execute_retp);
        vm.handlers[OpCode::Reti as usize] = HandlerType::Args0(Self::execute_reti);
        vm.handlers[OpCode::Retx as usize] = HandlerType::Args0(Self::execute_reti);
        vm.handlers[OpCode::Reta as usize] = HandlerType::Args0(Self::execute_reti);
        vm.handlers[OpCode::Retr as usize] = HandlerType::Args0(Self::execute_retr);
        vm.handlers[OpCode::Retc as usize] = HandlerType::Args0(Self::execute_retc);
        vm.handlers[OpCode::Retb as usize] = HandlerType::Args0(Self::execute_retc);
        vm.handlers[OpCode::Dmp as usize] = HandlerType::Q(Self::execute_dmp);
        vm.handlers[OpCode::Swp as usize] = HandlerType::Q(Self::execute_swp);

        // Checks
        for op in [OpCode::Chki, OpCode::Chkb, OpCode::Chkc, OpCode::Chkx] {
            vm.handlers[op as usize] = HandlerType::Q(Self::execute_chk);
        }
        vm.handlers[OpCode::Chka as usize] = HandlerType::Q(Self::execute_chka);
        vm.handlers[OpCode::Ckla as usize] = HandlerType::Q(Self::execute_chka);
        vm.handlers[OpCode::Chks as usize] = HandlerType::Q(Self::execute_chks);
        vm.handlers[OpCode::Cks as usize] = HandlerType::Args0(Self::execute_cks);
        for op in [OpCode::Ckvi, OpCode::Ckvx, OpCode::Ckvb, OpCode::Ckvc] {
            vm.handlers[op as usize] = HandlerType::Q(Self::execute_ckv);
        }
        vm.handlers[OpCode::Cke as usize] = HandlerType::Args0(Self::execute_cke);
        vm.handlers[OpCode::Cta as usize] = HandlerType::QQQ(Self::execute_cta);
        vm.handlers[OpCode::Ivti as usize] = HandlerType::QQQ(Self::execute_ivti);
        for op in [OpCode::Ivtx, OpCode::Ivtb, OpCode::Ivtc] {
            vm.handlers[op as usize] = HandlerType::QQQ(Self::execute_ivt_byte);
        }
        vm.handlers[OpCode::Cvbi as usize] = HandlerType::QQQ(Self::execute_cvbi);
        for op in [OpCode::Cvbx, OpCode::Cvbb, OpCode::Cvbc] {
            vm.handlers[op as usize] = HandlerType::QQQ(Self::execute_cvb_byte);
        }

        // VAR references
        vm.handlers[OpCode::Vbs as usize] = HandlerType::Q(Self::execute_vbs);
        vm.handlers[OpCode::Vbe as usize] = HandlerType::Args0(Self::execute_vbe);

        // Guarded blocks
        vm.handlers[OpCode::Bge as usize] = HandlerType::Q(Self::execute_bge);
        vm.handlers[OpCode::Ede as usize] = HandlerType::Args0(Self::execute_ede);
        vm.handlers[OpCode::Mse as usize] = HandlerType::Args0(Self::execute_mse);

        // Standard procedures
        vm.handlers[OpCode::Csp as usize] = HandlerType::Byte(Self::execute_csp);

        vm
    }

    /// Runs until the program stops or a terminal condition is reached.
    pub fn execute(&mut self) -> &VmState {
        self.execution_complete = false;
        while !self.execution_complete {
            self.step();
        }
        &self.state
    }

    /// Executes a single instruction, resolving any fault it raises.
    pub fn step(&mut self) -> bool {
        if let Err(fault) = self.execute_instruction() {
            self.resolve_fault(fault);
        }
        self.execution_complete
    }

    fn execute_instruction(&mut self) -> VmResult {
        if self.pc >= self.pctop {
            return Err(FatalCode::PcOutOfRange.into());
        }
        let opcode = self.memory.raw_byte(self.pc)?;

        #[cfg(feature = "debug_vm")]
        if self.debug_opcodes_enabled {
            self.debug_instruction(opcode);
        }

        #[cfg(feature = "debug_vm")]
        if self.debug_stats_enabled {
            self.debug.opcodes_executed += 1;
            self.debug.lowest_stack_pointer = self.debug.lowest_stack_pointer.min(self.sp);
        }

        self.pc += 1; // pc must advance past the opcode BEFORE handling the instruction

        match self.handlers[opcode as usize] {
            HandlerType::Args0(handler) => handler(self),
            HandlerType::Byte(handler) => {
                let value = self.fetch_byte()?;
                handler(self, value)
            }
            HandlerType::P(handler) => {
                let p = self.fetch_byte()?;
                self.p = p;
                handler(self, p)
            }
            HandlerType::Q(handler) => {
                let q = self.fetch_word()?;
                handler(self, q)
            }
            HandlerType::PQ(handler) => {
                let p = self.fetch_byte()?;
                self.p = p;
                let q = self.fetch_word()?;
                handler(self, p, q)
            }
            HandlerType::QQ(handler) => {
                let q = self.fetch_word()?;
                let q1 = self.fetch_word()?;
                handler(self, q, q1)
            }
            HandlerType::QQQ(handler) => {
                let q = self.fetch_word()?;
                let q1 = self.fetch_word()?;
                let q2 = self.fetch_word()?;
                handler(self, q, q1, q2)
            }
        }
    }

    #[inline]
    fn fetch_byte(&mut self) -> VmResult<u8> {
        let value = self.memory.get_byte(self.pc)?;
        self.pc += 1;
        Ok(value)
    }

    #[inline]
    fn fetch_word(&mut self) -> VmResult<Address> {
        let value = self.memory.get_adr(self.pc)?;
        self.pc += p6_vm_types::ADR_SIZE;
        Ok(value)
    }

    #[cfg(feature = "debug_vm")]
    fn debug_instruction(&self, opcode: u8) {
        let name = OpCode::try_from(opcode).map_or("???", |op| op.as_string());
        print!(
            "{}",
            tinter::bright_black(&format!(
                "sp: {:08X} mp: {:08X} np: {:08X} ",
                self.sp, self.mp, self.np
            ))
        );
        println!("> {:08X}: {}", self.pc, tinter::green(name));
    }

    fn execute_invalid(&mut self) -> VmResult {
        Err(FatalCode::InvalidInstruction.into())
    }

    #[inline]
    fn execute_nop(&mut self) -> VmResult {
        Ok(())
    }

    #[inline]
    fn execute_stp(&mut self) -> VmResult {
        self.execution_complete = true;
        self.state = VmState::Stopped;
        Ok(())
    }

    #[inline]
    fn execute_mrkl(&mut self, line: Address) -> VmResult {
        self.source_line = line;
        Ok(())
    }

    fn resolve_fault(&mut self, fault: Fault) {
        let outcome = match fault {
            Fault::Exception(code) => self.throw_value(self.pctop + Address::from(code.code())),
            Fault::Thrown(value) => self.throw_value(value),
            terminal => Err(terminal),
        };
        if let Err(terminal) = outcome {
            self.terminate(terminal);
        }
    }

    fn terminate(&mut self, fault: Fault) {
        let state = match fault {
            Fault::Exception(code) => VmState::Trap(TrapCode::Unhandled(code)),
            Fault::Thrown(value) => VmState::Trap(self.unhandled_trap(value)),
            Fault::Fatal(code) => VmState::Trap(TrapCode::Fatal(code)),
            Fault::Assertion(text) => VmState::Panic(text),
            Fault::Halt => VmState::Halt,
        };
        match &state {
            VmState::Trap(trap_code) => error!(%trap_code, pc = self.pc, line = self.source_line, "TRAP"),
            VmState::Panic(text) => error!(text, line = self.source_line, "assertion failed"),
            _ => debug!("program halted"),
        }
        self.internal_trap(state);
    }

    /// Maps a thrown value back onto a fixed exception code when it is one.
    fn unhandled_trap(&self, value: Address) -> TrapCode {
        u8::try_from(value - self.pctop)
            .ok()
            .and_then(|code| ExceptionCode::try_from(code).ok())
            .map_or(TrapCode::Fatal(FatalCode::UnhandledException), TrapCode::Unhandled)
    }

    pub fn internal_trap(&mut self, state: VmState) {
        self.execution_complete = true;
        self.state = state;
    }

    /// Exit status for the current state: 0 only after the stop instruction.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.state {
            VmState::Stopped => 0,
            _ => 1,
        }
    }

    /// Closes all files, reports the terminal condition and the final
    /// messages on the output stream, and returns the process exit status.
    pub fn finish(&mut self) -> i32 {
        let code = self.exit_code();
        let diagnostic = match &self.state {
            VmState::Trap(trap_code) => Some(format!(
                "\n*** Runtime error{}{}\n",
                self.line_prefix(),
                trap_code.message()
            )),
            VmState::Panic(text) => Some(format!(
                "\n*** Runtime error\n{}{text}\n",
                if self.source_line > 0 {
                    format!(" [{}]: ", self.source_line)
                } else {
                    String::new()
                }
            )),
            _ => None,
        };
        self.files.close_all();
        let mut text = diagnostic.unwrap_or_default();
        text.push('\n');
        if code != 0 {
            text.push_str("Program aborted\n");
        }
        text.push_str("program complete\n");
        self.files.write_host_output(text.as_bytes());
        code
    }

    fn line_prefix(&self) -> String {
        if self.source_line > 0 {
            format!(" [{}]: ", self.source_line)
        } else {
            ": ".to_string()
        }
    }
}

impl Vm {
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    pub(crate) const fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    #[must_use]
    pub const fn pc(&self) -> Address {
        self.pc
    }

    pub const fn set_pc(&mut self, pc: Address) {
        self.pc = pc;
    }

    #[must_use]
    pub const fn pctop(&self) -> Address {
        self.pctop
    }

    #[must_use]
    pub const fn gbtop(&self) -> Address {
        self.gbtop
    }

    #[must_use]
    pub const fn np(&self) -> Address {
        self.np
    }

    #[must_use]
    pub const fn sp(&self) -> Address {
        self.sp
    }

    #[must_use]
    pub const fn mp(&self) -> Address {
        self.mp
    }

    #[must_use]
    pub const fn ep(&self) -> Address {
        self.ep
    }

    #[must_use]
    pub const fn source_line(&self) -> Address {
        self.source_line
    }

    /// The active guarded block as (handler, stack pointer, mark pointer).
    #[must_use]
    pub const fn guard(&self) -> (Address, Address, Address) {
        (self.expadr, self.expstk, self.expmrk)
    }

    #[must_use]
    pub const fn checks(&self) -> &CheckFlags {
        &self.checks
    }

    /// Return address recorded in the current mark.
    pub fn return_address(&self) -> VmResult<Address> {
        self.memory.get_adr(self.mp + mark::RETURN_ADDRESS)
    }

    /// Integer on top of the stack, without popping it.
    pub fn top_int(&self) -> VmResult<i32> {
        self.memory.get_int(self.sp)
    }

    /// Real on top of the stack, without popping it.
    pub fn top_real(&self) -> VmResult<f64> {
        self.memory.get_real(self.sp)
    }
}
