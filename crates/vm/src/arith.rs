/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::exception::ExceptionCode;
use p6_vm_types::{Address, INT_MAX};

const fn overflow() -> crate::Fault {
    crate::Fault::Exception(ExceptionCode::IntegerValueOverflow)
}

/// `a + b` overflows only when both have the same sign.
const fn add_overflows(a: i64, b: i64) -> bool {
    (a < 0) == (b < 0) && INT_MAX - a.abs() < b.abs()
}

impl Vm {
    fn checked_add(&self, a: i32, b: i64) -> VmResult<i32> {
        if self.checks.check_overflow && add_overflows(i64::from(a), b) {
            return Err(overflow());
        }
        Ok((i64::from(a) + b) as i32)
    }

    fn checked_sub(&self, a: i32, b: i64) -> VmResult<i32> {
        if self.checks.check_overflow && (a < 0) != (b < 0) && INT_MAX - i64::from(a).abs() < b.abs()
        {
            return Err(overflow());
        }
        Ok((i64::from(a) - b) as i32)
    }

    /// Also `incx`, `incb` and `incc`.
    pub(crate) fn execute_inc(&mut self, q: Address) -> VmResult {
        let value = self.pop_int()?;
        let result = self.checked_add(value, q)?;
        self.push_int(result)
    }

    pub(crate) fn execute_dec(&mut self, q: Address) -> VmResult {
        let value = self.pop_int()?;
        let result = self.checked_sub(value, q)?;
        self.push_int(result)
    }

    pub(crate) fn execute_adi(&mut self) -> VmResult {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        let result = self.checked_add(a, i64::from(b))?;
        self.push_int(result)
    }

    pub(crate) fn execute_sbi(&mut self) -> VmResult {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        let result = self.checked_sub(a, i64::from(b))?;
        self.push_int(result)
    }

    pub(crate) fn execute_mpi(&mut self) -> VmResult {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        if self.checks.check_overflow
            && b != 0
            && i64::from(a).abs() > INT_MAX / i64::from(b).abs()
        {
            return Err(overflow());
        }
        self.push_int(a.wrapping_mul(b))
    }

    pub(crate) fn execute_sqi(&mut self) -> VmResult {
        let a = self.pop_int()?;
        if self.checks.check_overflow && a != 0 && i64::from(a).abs() > INT_MAX / i64::from(a).abs()
        {
            return Err(overflow());
        }
        self.push_int(a.wrapping_mul(a))
    }

    pub(crate) fn execute_dvi(&mut self) -> VmResult {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        if b == 0 {
            return Err(ExceptionCode::ZeroDivide.into());
        }
        self.push_int(a.wrapping_div(b))
    }

    /// The result is always in `0..b`.
    pub(crate) fn execute_mod(&mut self) -> VmResult {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        if b <= 0 {
            return Err(ExceptionCode::InvalidDivisorToMod.into());
        }
        self.push_int(a.rem_euclid(b))
    }

    pub(crate) fn execute_ngi(&mut self) -> VmResult {
        let a = self.pop_int()?;
        self.push_int(a.wrapping_neg())
    }

    pub(crate) fn execute_abi(&mut self) -> VmResult {
        let a = self.pop_int()?;
        self.push_int(a.wrapping_abs())
    }

    pub(crate) fn execute_odd(&mut self) -> VmResult {
        let a = self.pop_int()?;
        self.push_int(a & 1)
    }

    fn non_negative(value: i32) -> VmResult<i32> {
        if value < 0 {
            return Err(ExceptionCode::BooleanOperatorOfNegative.into());
        }
        Ok(value)
    }

    pub(crate) fn execute_noti(&mut self) -> VmResult {
        let a = Self::non_negative(self.pop_int()?)?;
        self.push_int(!a)
    }

    pub(crate) fn execute_notb(&mut self) -> VmResult {
        let a = self.pop_int()?;
        self.push_bool(a == 0)
    }

    pub(crate) fn execute_and(&mut self) -> VmResult {
        let b = Self::non_negative(self.pop_int()?)?;
        let a = Self::non_negative(self.pop_int()?)?;
        self.push_int(a & b)
    }

    pub(crate) fn execute_ior(&mut self) -> VmResult {
        let b = Self::non_negative(self.pop_int()?)?;
        let a = Self::non_negative(self.pop_int()?)?;
        self.push_int(a | b)
    }

    pub(crate) fn execute_xor(&mut self) -> VmResult {
        let b = Self::non_negative(self.pop_int()?)?;
        let a = Self::non_negative(self.pop_int()?)?;
        self.push_int(a ^ b)
    }

    pub(crate) fn execute_adr(&mut self) -> VmResult {
        let b = self.pop_real()?;
        let a = self.pop_real()?;
        self.push_real(a + b)
    }

    pub(crate) fn execute_sbr(&mut self) -> VmResult {
        let b = self.pop_real()?;
        let a = self.pop_real()?;
        self.push_real(a - b)
    }

    pub(crate) fn execute_mpr(&mut self) -> VmResult {
        let b = self.pop_real()?;
        let a = self.pop_real()?;
        self.push_real(a * b)
    }

    pub(crate) fn execute_dvr(&mut self) -> VmResult {
        let b = self.pop_real()?;
        let a = self.pop_real()?;
        if self.checks.check_overflow && b == 0.0 {
            return Err(ExceptionCode::ZeroDivide.into());
        }
        self.push_real(a / b)
    }

    pub(crate) fn execute_ngr(&mut self) -> VmResult {
        let a = self.pop_real()?;
        self.push_real(-a)
    }

    pub(crate) fn execute_sqr(&mut self) -> VmResult {
        let a = self.pop_real()?;
        self.push_real(a * a)
    }

    pub(crate) fn execute_abr(&mut self) -> VmResult {
        let a = self.pop_real()?;
        self.push_real(a.abs())
    }

    pub(crate) fn execute_flt(&mut self) -> VmResult {
        let a = self.pop_int()?;
        self.push_real(f64::from(a))
    }

    /// Converts the integer under a real on top of the stack.
    pub(crate) fn execute_flo(&mut self) -> VmResult {
        let r = self.pop_real()?;
        let a = self.pop_int()?;
        self.push_real(f64::from(a))?;
        self.push_real(r)
    }

    pub(crate) fn execute_trc(&mut self) -> VmResult {
        let r = self.pop_real()?;
        let limit = INT_MAX as f64;
        if self.checks.check_overflow && (r < -limit || r > limit) {
            return Err(ExceptionCode::RealArgumentTooLarge.into());
        }
        self.push_int(r.trunc() as i32)
    }

    pub(crate) fn execute_rnd(&mut self) -> VmResult {
        let r = self.pop_real()?;
        let limit = INT_MAX as f64 + 0.5;
        if self.checks.check_overflow && (r < -limit || r > limit) {
            return Err(ExceptionCode::RealArgumentTooLarge.into());
        }
        self.push_int(r.round() as i32)
    }
}
