/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// How the bytes following an opcode are decoded.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperandShape {
    Bare,
    /// One unsigned byte: a lexical level difference or a parameter size.
    P,
    /// One signed address-sized word.
    Q,
    PQ,
    QQ,
    QQQ,
    /// A four byte integer literal.
    InlineInt,
    /// A single literal byte (`ldcc`, `ldcb`, and the `csp` selector).
    InlineByte,
}

impl OperandShape {
    /// Number of operand bytes following the opcode.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Bare => 0,
            Self::P | Self::InlineByte => 1,
            Self::Q | Self::InlineInt => 4,
            Self::PQ => 5,
            Self::QQ => 8,
            Self::QQQ => 12,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InvalidOpCode(pub u8);

impl Display for InvalidOpCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid opcode {}", self.0)
    }
}

impl Error for InvalidOpCode {}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseOpCodeError;

impl Display for ParseOpCodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unable to parse string into a valid OpCode")
    }
}

impl Error for ParseOpCodeError {}

macro_rules! opcodes {
    ($($name:ident = $value:literal => $mnemonic:literal, $shape:ident;)*) => {
        /// The instruction set. The numeric values are the code deck encoding.
        #[repr(u8)]
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub enum OpCode {
            $($name = $value,)*
        }

        pub const ALL_OPCODES: &[OpCode] = &[$(OpCode::$name,)*];

        impl OpCode {
            #[allow(clippy::too_many_lines)]
            #[must_use]
            pub const fn as_string(&self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic,)*
                }
            }

            #[allow(clippy::too_many_lines)]
            #[must_use]
            pub const fn operand_shape(&self) -> OperandShape {
                match self {
                    $(Self::$name => OperandShape::$shape,)*
                }
            }
        }

        impl TryFrom<u8> for OpCode {
            type Error = InvalidOpCode;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    _ => Err(InvalidOpCode(value)),
                }
            }
        }

        impl FromStr for OpCode {
            type Err = ParseOpCodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($mnemonic => Ok(Self::$name),)*
                    _ => Err(ParseOpCodeError),
                }
            }
        }
    };
}

opcodes! {
    Lodi = 0 => "lodi", PQ;
    Ldoi = 1 => "ldoi", Q;
    Stri = 2 => "stri", PQ;
    Sroi = 3 => "sroi", Q;
    Lda = 4 => "lda", PQ;
    Lao = 5 => "lao", Q;
    Stoi = 6 => "stoi", Bare;
    Ldcs = 7 => "ldcs", Q;
    Cjp = 8 => "cjp", QQ;
    Indi = 9 => "indi", Q;
    Inci = 10 => "inci", Q;
    Mst = 11 => "mst", P;
    Cup = 12 => "cup", PQ;
    Ents = 13 => "ents", Q;
    Retp = 14 => "retp", Bare;
    Csp = 15 => "csp", InlineByte;
    Ixa = 16 => "ixa", Q;
    Equa = 17 => "equa", Bare;
    Neqa = 18 => "neqa", Bare;
    Brk = 19 => "brk", Bare;
    Lnp = 20 => "lnp", Q;
    Cal = 21 => "cal", Q;
    Ret = 22 => "ret", Bare;
    Ujp = 23 => "ujp", Q;
    Fjp = 24 => "fjp", Q;
    Xjp = 25 => "xjp", Q;
    Chki = 26 => "chki", Q;
    Cuv = 27 => "cuv", Q;
    Adi = 28 => "adi", Bare;
    Adr = 29 => "adr", Bare;
    Sbi = 30 => "sbi", Bare;
    Sbr = 31 => "sbr", Bare;
    Sgs = 32 => "sgs", Bare;
    Flt = 33 => "flt", Bare;
    Flo = 34 => "flo", Bare;
    Trc = 35 => "trc", Bare;
    Ngi = 36 => "ngi", Bare;
    Ngr = 37 => "ngr", Bare;
    Sqi = 38 => "sqi", Bare;
    Sqr = 39 => "sqr", Bare;
    Abi = 40 => "abi", Bare;
    Abr = 41 => "abr", Bare;
    Notb = 42 => "notb", Bare;
    And = 43 => "and", Bare;
    Ior = 44 => "ior", Bare;
    Dif = 45 => "dif", Bare;
    Int = 46 => "int", Bare;
    Uni = 47 => "uni", Bare;
    Inn = 48 => "inn", Bare;
    Mod = 49 => "mod", Bare;
    Odd = 50 => "odd", Bare;
    Mpi = 51 => "mpi", Bare;
    Mpr = 52 => "mpr", Bare;
    Dvi = 53 => "dvi", Bare;
    Dvr = 54 => "dvr", Bare;
    Mov = 55 => "mov", Q;
    Lca = 56 => "lca", Q;
    Deci = 57 => "deci", Q;
    Stp = 58 => "stp", Bare;
    Ordi = 59 => "ordi", Bare;
    Chr = 60 => "chr", Bare;
    Ujc = 61 => "ujc", Bare;
    Rnd = 62 => "rnd", Bare;
    Pck = 63 => "pck", QQ;
    Upk = 64 => "upk", QQ;
    Ldoa = 65 => "ldoa", Q;
    Ldor = 66 => "ldor", Q;
    Ldos = 67 => "ldos", Q;
    Ldob = 68 => "ldob", Q;
    Ldoc = 69 => "ldoc", Q;
    Stra = 70 => "stra", PQ;
    Strr = 71 => "strr", PQ;
    Strs = 72 => "strs", PQ;
    Strb = 73 => "strb", PQ;
    Strc = 74 => "strc", PQ;
    Sroa = 75 => "sroa", Q;
    Sror = 76 => "sror", Q;
    Sros = 77 => "sros", Q;
    Srob = 78 => "srob", Q;
    Sroc = 79 => "sroc", Q;
    Stoa = 80 => "stoa", Bare;
    Stor = 81 => "stor", Bare;
    Stos = 82 => "stos", Bare;
    Stob = 83 => "stob", Bare;
    Stoc = 84 => "stoc", Bare;
    Inda = 85 => "inda", Q;
    Indr = 86 => "indr", Q;
    Inds = 87 => "inds", Q;
    Indb = 88 => "indb", Q;
    Indc = 89 => "indc", Q;
    Inca = 90 => "inca", Q;
    Suv = 91 => "suv", QQ;
    Vbs = 92 => "vbs", Q;
    Incb = 93 => "incb", Q;
    Incc = 94 => "incc", Q;
    Chka = 95 => "chka", Q;
    Vbe = 96 => "vbe", Bare;
    Chks = 97 => "chks", Q;
    Chkb = 98 => "chkb", Q;
    Chkc = 99 => "chkc", Q;
    Cvbi = 100 => "cvbi", QQQ;
    Ivtx = 101 => "ivtx", QQQ;
    Ivtb = 102 => "ivtb", QQQ;
    Decb = 103 => "decb", Q;
    Decc = 104 => "decc", Q;
    Loda = 105 => "loda", PQ;
    Lodr = 106 => "lodr", PQ;
    Lods = 107 => "lods", PQ;
    Lodb = 108 => "lodb", PQ;
    Lodc = 109 => "lodc", PQ;
    Rgs = 110 => "rgs", Bare;
    Ivtc = 111 => "ivtc", QQQ;
    Ipj = 112 => "ipj", PQ;
    Cip = 113 => "cip", P;
    Lpa = 114 => "lpa", PQ;
    Cvbx = 115 => "cvbx", QQQ;
    Cvbb = 116 => "cvbb", QQQ;
    Dmp = 117 => "dmp", Q;
    Swp = 118 => "swp", Q;
    Tjp = 119 => "tjp", Q;
    Lip = 120 => "lip", PQ;
    Cvbc = 121 => "cvbc", QQQ;
    Ldci = 123 => "ldci", InlineInt;
    Ldcr = 124 => "ldcr", Q;
    Ldcn = 125 => "ldcn", Bare;
    Ldcb = 126 => "ldcb", InlineByte;
    Ldcc = 127 => "ldcc", InlineByte;
    Reti = 128 => "reti", Bare;
    Retr = 129 => "retr", Bare;
    Retc = 130 => "retc", Bare;
    Retb = 131 => "retb", Bare;
    Reta = 132 => "reta", Bare;
    Ordb = 134 => "ordb", Bare;
    Ordc = 136 => "ordc", Bare;
    Equi = 137 => "equi", Bare;
    Equr = 138 => "equr", Bare;
    Equb = 139 => "equb", Bare;
    Equs = 140 => "equs", Bare;
    Equc = 141 => "equc", Bare;
    Equm = 142 => "equm", Q;
    Neqi = 143 => "neqi", Bare;
    Neqr = 144 => "neqr", Bare;
    Neqb = 145 => "neqb", Bare;
    Neqs = 146 => "neqs", Bare;
    Neqc = 147 => "neqc", Bare;
    Neqm = 148 => "neqm", Q;
    Geqi = 149 => "geqi", Bare;
    Geqr = 150 => "geqr", Bare;
    Geqb = 151 => "geqb", Bare;
    Geqs = 152 => "geqs", Bare;
    Geqc = 153 => "geqc", Bare;
    Geqm = 154 => "geqm", Q;
    Grti = 155 => "grti", Bare;
    Grtr = 156 => "grtr", Bare;
    Grtb = 157 => "grtb", Bare;
    Grts = 158 => "grts", Bare;
    Grtc = 159 => "grtc", Bare;
    Grtm = 160 => "grtm", Q;
    Leqi = 161 => "leqi", Bare;
    Leqr = 162 => "leqr", Bare;
    Leqb = 163 => "leqb", Bare;
    Leqs = 164 => "leqs", Bare;
    Leqc = 165 => "leqc", Bare;
    Leqm = 166 => "leqm", Q;
    Lesi = 167 => "lesi", Bare;
    Lesr = 168 => "lesr", Bare;
    Lesb = 169 => "lesb", Bare;
    Less = 170 => "less", Bare;
    Lesc = 171 => "lesc", Bare;
    Lesm = 172 => "lesm", Q;
    Ente = 173 => "ente", Q;
    Mrkl = 174 => "mrkl", Q;
    Ckvi = 175 => "ckvi", Q;
    Ckvb = 179 => "ckvb", Q;
    Ckvc = 180 => "ckvc", Q;
    Dupi = 181 => "dupi", Bare;
    Dupa = 182 => "dupa", Bare;
    Dupr = 183 => "dupr", Bare;
    Dups = 184 => "dups", Bare;
    Dupb = 185 => "dupb", Bare;
    Dupc = 186 => "dupc", Bare;
    Cks = 187 => "cks", Bare;
    Cke = 188 => "cke", Bare;
    Inv = 189 => "inv", Bare;
    Ckla = 190 => "ckla", Q;
    Cta = 191 => "cta", QQQ;
    Ivti = 192 => "ivti", QQQ;
    Lodx = 193 => "lodx", PQ;
    Ldox = 194 => "ldox", Q;
    Strx = 195 => "strx", PQ;
    Srox = 196 => "srox", Q;
    Stox = 197 => "stox", Bare;
    Indx = 198 => "indx", Q;
    Chkx = 199 => "chkx", Q;
    Ordx = 200 => "ordx", Bare;
    Incx = 201 => "incx", Q;
    Decx = 202 => "decx", Q;
    Ckvx = 203 => "ckvx", Q;
    Retx = 204 => "retx", Bare;
    Noti = 205 => "noti", Bare;
    Xor = 206 => "xor", Bare;
    Bge = 207 => "bge", Q;
    Ede = 208 => "ede", Bare;
    Mse = 209 => "mse", Bare;}

impl Display for OpCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl OpCode {
    /// Total encoded length including the opcode byte.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        1 + self.operand_shape().len()
    }

    /// Jump-like instructions whose first `q` operand is a code address.
    #[must_use]
    pub const fn jump_target_operand(&self) -> Option<usize> {
        match self {
            Self::Ujp | Self::Fjp | Self::Tjp | Self::Xjp | Self::Cal | Self::Bge => Some(0),
            Self::Cup | Self::Ipj | Self::Lpa => Some(0),
            Self::Cjp => Some(1),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_bytes_are_rejected() {
        for value in [122u8, 133, 135, 176, 177, 178, 210, 255] {
            assert_eq!(OpCode::try_from(value), Err(InvalidOpCode(value)));
        }
    }

    #[test]
    fn every_opcode_round_trips_through_its_byte() {
        assert_eq!(ALL_OPCODES.len(), 204);
        for op in ALL_OPCODES {
            assert_eq!(OpCode::try_from(*op as u8), Ok(*op));
            assert_eq!(op.as_string().parse::<OpCode>(), Ok(*op));
        }
    }

    #[test]
    fn shapes() {
        assert_eq!(OpCode::Lodi.encoded_len(), 6);
        assert_eq!(OpCode::Ldci.encoded_len(), 5);
        assert_eq!(OpCode::Csp.encoded_len(), 2);
        assert_eq!(OpCode::Cta.encoded_len(), 13);
        assert_eq!(OpCode::Adi.encoded_len(), 1);
    }
}
