/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::fmt::{Display, Formatter};

macro_rules! standard_procs {
    ($($name:ident = $value:literal => $mnemonic:literal,)*) => {
        /// Selector byte following the `csp` opcode.
        #[repr(u8)]
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub enum StandardProc {
            $($name = $value,)*
        }

        impl StandardProc {
            #[must_use]
            pub const fn as_string(&self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic,)*
                }
            }
        }

        impl TryFrom<u8> for StandardProc {
            type Error = ();

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    _ => Err(()),
                }
            }
        }
    };
}

standard_procs! {
    Get = 0 => "get",
    Put = 1 => "put",
    Thw = 2 => "thw",
    Rln = 3 => "rln",
    New = 4 => "new",
    Wln = 5 => "wln",
    Wrs = 6 => "wrs",
    Eln = 7 => "eln",
    Wri = 8 => "wri",
    Wrr = 9 => "wrr",
    Wrc = 10 => "wrc",
    Rdi = 11 => "rdi",
    Rdr = 12 => "rdr",
    Rdc = 13 => "rdc",
    Sin = 14 => "sin",
    Cos = 15 => "cos",
    Exp = 16 => "exp",
    Log = 17 => "log",
    Sqt = 18 => "sqt",
    Atn = 19 => "atn",
    Sav = 20 => "sav",
    Pag = 21 => "pag",
    Rsf = 22 => "rsf",
    Rwf = 23 => "rwf",
    Wrb = 24 => "wrb",
    Wrf = 25 => "wrf",
    Dsp = 26 => "dsp",
    Wbf = 27 => "wbf",
    Wbi = 28 => "wbi",
    Wbr = 29 => "wbr",
    Wbc = 30 => "wbc",
    Wbb = 31 => "wbb",
    Rbf = 32 => "rbf",
    Rsb = 33 => "rsb",
    Rwb = 34 => "rwb",
    Gbf = 35 => "gbf",
    Pbf = 36 => "pbf",
    Rib = 37 => "rib",
    Rcb = 38 => "rcb",
    Nwl = 39 => "nwl",
    Dsl = 40 => "dsl",
    Eof = 41 => "eof",
    Efb = 42 => "efb",
    Fbv = 43 => "fbv",
    Fvb = 44 => "fvb",
    Wbx = 45 => "wbx",
    Asst = 46 => "asst",
    Clst = 47 => "clst",
    Pos = 48 => "pos",
    Upd = 49 => "upd",
    Appt = 50 => "appt",
    Del = 51 => "del",
    Chg = 52 => "chg",
    Len = 53 => "len",
    Loc = 54 => "loc",
    Exs = 55 => "exs",
    Assb = 56 => "assb",
    Clsb = 57 => "clsb",
    Appb = 58 => "appb",
    Hlt = 59 => "hlt",
    Ast = 60 => "ast",
    Asts = 61 => "asts",
    Wrih = 62 => "wrih",
    Wrio = 63 => "wrio",
    Wrib = 64 => "wrib",
    Wrsp = 65 => "wrsp",
    Wiz = 66 => "wiz",
    Wizh = 67 => "wizh",
    Wizo = 68 => "wizo",
    Wizb = 69 => "wizb",
    Rds = 70 => "rds",
    Ribf = 71 => "ribf",
    Rdif = 72 => "rdif",
    Rdrf = 73 => "rdrf",
    Rcbf = 74 => "rcbf",
    Rdcf = 75 => "rdcf",
    Rdsf = 76 => "rdsf",
    Rdsp = 77 => "rdsp",
    Aeft = 78 => "aeft",
    Aefb = 79 => "aefb",
    Rdie = 80 => "rdie",
    Rdre = 81 => "rdre",
}

impl Display for StandardProc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}
