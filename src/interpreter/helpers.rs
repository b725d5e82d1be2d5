use super::*;
use crate::types::{JsBigInt, bigint_ops};
use num_bigint::BigInt;

/// Operand after ToNumeric.
pub(crate) enum Numeric {
    Number(f64),
    BigInt(BigInt),
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum PreferredType {
    Default,
    Number,
    String,
}

// ToNumber for values that are already primitive
pub(crate) fn primitive_to_number(val: &JsValue) -> f64 {
    match val {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => *b as u8 as f64,
        JsValue::Number(n) => *n,
        JsValue::String(s) => number_ops::from_str(s.as_str()),
        JsValue::BigInt(b) => b.value.to_string().parse().unwrap_or(f64::NAN),
        JsValue::Symbol(_) | JsValue::Object(_) => f64::NAN,
    }
}

pub(crate) fn strict_equality(left: &JsValue, right: &JsValue) -> bool {
    match (left, right) {
        (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
        (JsValue::Number(a), JsValue::Number(b)) => a == b,
        (JsValue::String(a), JsValue::String(b)) => a == b,
        (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
        (JsValue::BigInt(a), JsValue::BigInt(b)) => a == b,
        (JsValue::Object(a), JsValue::Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

pub(crate) fn typeof_value(val: &JsValue) -> &'static str {
    match val {
        JsValue::Undefined => "undefined",
        JsValue::Null => "object",
        JsValue::Boolean(_) => "boolean",
        JsValue::Number(_) => "number",
        JsValue::String(_) => "string",
        JsValue::Symbol(_) => "symbol",
        JsValue::BigInt(_) => "bigint",
        JsValue::Object(o) if o.is_callable() => "function",
        JsValue::Object(_) => "object",
    }
}

fn compare_strings(a: &str, b: &str) -> bool {
    a.encode_utf16().lt(b.encode_utf16())
}

fn bigint_to_f64(b: &BigInt) -> f64 {
    b.to_string().parse().unwrap_or(f64::NAN)
}

impl Interpreter {
    pub(crate) fn make_error(&mut self, kind: &str, message: &str) -> JsValue {
        let prototype = self
            .intrinsics
            .error_prototypes
            .get(kind)
            .cloned()
            .or_else(|| Some(self.intrinsics.object_prototype.clone()));
        let mut data = ObjectData::new(prototype, ObjectKind::Error);
        data.insert_builtin("message", JsValue::from(message));
        JsValue::Object(JsObject::new(data))
    }

    pub(crate) fn type_error(&mut self, message: &str) -> EvalError {
        EvalError::Thrown(self.make_error("TypeError", message))
    }

    pub(crate) fn reference_error(&mut self, message: &str) -> EvalError {
        EvalError::Thrown(self.make_error("ReferenceError", message))
    }

    pub(crate) fn range_error(&mut self, message: &str) -> EvalError {
        EvalError::Thrown(self.make_error("RangeError", message))
    }

    // §7.1.1 ToPrimitive
    pub(crate) fn to_primitive(&mut self, val: &JsValue, hint: PreferredType) -> EvalResult<JsValue> {
        let JsValue::Object(_) = val else {
            return Ok(val.clone());
        };
        let order = if hint == PreferredType::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get_property(val, name)?;
            if method.is_callable() {
                let result = self.call_function(&method, val.clone(), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    // §7.1.4 ToNumber
    pub(crate) fn to_number(&mut self, val: &JsValue) -> EvalResult<f64> {
        match val {
            JsValue::Symbol(_) => Err(self.type_error("Cannot convert a Symbol value to a number")),
            JsValue::BigInt(_) => Err(self.type_error("Cannot convert a BigInt value to a number")),
            JsValue::Object(_) => {
                let prim = self.to_primitive(val, PreferredType::Number)?;
                self.to_number(&prim)
            }
            _ => Ok(primitive_to_number(val)),
        }
    }

    pub(crate) fn to_numeric(&mut self, val: &JsValue) -> EvalResult<Numeric> {
        let prim = self.to_primitive(val, PreferredType::Number)?;
        match prim {
            JsValue::BigInt(b) => Ok(Numeric::BigInt(b.value)),
            other => Ok(Numeric::Number(self.to_number(&other)?)),
        }
    }

    // §7.1.17 ToString
    pub(crate) fn to_js_string(&mut self, val: &JsValue) -> EvalResult<JsString> {
        match val {
            JsValue::String(s) => Ok(s.clone()),
            JsValue::Symbol(_) => Err(self.type_error("Cannot convert a Symbol value to a string")),
            JsValue::Object(_) => {
                let prim = self.to_primitive(val, PreferredType::String)?;
                self.to_js_string(&prim)
            }
            other => Ok(JsString::from(other.to_string())),
        }
    }

    pub(crate) fn to_property_key(&mut self, val: &JsValue) -> EvalResult<String> {
        match val {
            JsValue::Symbol(s) => Ok(s.to_property_key()),
            JsValue::String(s) => Ok(s.as_str().to_string()),
            JsValue::Object(_) => {
                let prim = self.to_primitive(val, PreferredType::String)?;
                self.to_property_key(&prim)
            }
            other => Ok(other.to_string()),
        }
    }

    // §7.2.14 IsLooselyEqual
    pub(crate) fn loose_equality(&mut self, left: &JsValue, right: &JsValue) -> EvalResult<bool> {
        if std::mem::discriminant(left) == std::mem::discriminant(right) {
            return Ok(strict_equality(left, right));
        }
        Ok(match (left, right) {
            (l, r) if l.is_nullish() && r.is_nullish() => true,
            (l, r) if l.is_nullish() || r.is_nullish() => false,
            (JsValue::Number(_), JsValue::String(_)) | (JsValue::String(_), JsValue::Number(_)) => {
                primitive_to_number(left) == primitive_to_number(right)
            }
            (JsValue::BigInt(b), JsValue::String(s)) | (JsValue::String(s), JsValue::BigInt(b)) => {
                bigint_ops::parse_literal(s.as_str().trim()).is_some_and(|v| v == b.value)
            }
            (JsValue::BigInt(b), JsValue::Number(n)) | (JsValue::Number(n), JsValue::BigInt(b)) => {
                bigint_to_f64(&b.value) == *n
            }
            (JsValue::Boolean(_), _) => {
                let l = JsValue::Number(primitive_to_number(left));
                return self.loose_equality(&l, right);
            }
            (_, JsValue::Boolean(_)) => {
                let r = JsValue::Number(primitive_to_number(right));
                return self.loose_equality(left, &r);
            }
            (JsValue::Object(_), _) => {
                let l = self.to_primitive(left, PreferredType::Default)?;
                return self.loose_equality(&l, right);
            }
            (_, JsValue::Object(_)) => {
                let r = self.to_primitive(right, PreferredType::Default)?;
                return self.loose_equality(left, &r);
            }
            _ => false,
        })
    }

    /// `left < right`; `None` when either side is NaN.
    fn less_than(&mut self, left: &JsValue, right: &JsValue, left_first: bool) -> EvalResult<Option<bool>> {
        let (l, r) = if left_first {
            let l = self.to_primitive(left, PreferredType::Number)?;
            (l, self.to_primitive(right, PreferredType::Number)?)
        } else {
            let r = self.to_primitive(right, PreferredType::Number)?;
            (self.to_primitive(left, PreferredType::Number)?, r)
        };
        if let (JsValue::String(a), JsValue::String(b)) = (&l, &r) {
            return Ok(Some(compare_strings(a.as_str(), b.as_str())));
        }
        match (self.to_numeric(&l)?, self.to_numeric(&r)?) {
            (Numeric::BigInt(a), Numeric::BigInt(b)) => Ok(Some(a < b)),
            (Numeric::Number(a), Numeric::Number(b)) => Ok(number_ops::less_than(a, b)),
            (Numeric::BigInt(a), Numeric::Number(b)) => Ok(number_ops::less_than(bigint_to_f64(&a), b)),
            (Numeric::Number(a), Numeric::BigInt(b)) => Ok(number_ops::less_than(a, bigint_to_f64(&b))),
        }
    }

    pub(crate) fn instance_of(&mut self, value: &JsValue, target: &JsValue) -> EvalResult<bool> {
        if !target.is_callable() {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        let JsValue::Object(obj) = value else {
            return Ok(false);
        };
        let proto = self.get_property(target, "prototype")?;
        let JsValue::Object(proto) = proto else {
            return Err(self.type_error("Function has non-object prototype in instanceof check"));
        };
        let mut current = obj.prototype();
        while let Some(p) = current {
            if p.ptr_eq(&proto) {
                return Ok(true);
            }
            current = p.prototype();
        }
        Ok(false)
    }

    pub(crate) fn binary_op(&mut self, op: BinaryOp, left: &JsValue, right: &JsValue) -> EvalResult<JsValue> {
        Ok(match op {
            BinaryOp::StrictEq => JsValue::Boolean(strict_equality(left, right)),
            BinaryOp::StrictNotEq => JsValue::Boolean(!strict_equality(left, right)),
            BinaryOp::Eq => JsValue::Boolean(self.loose_equality(left, right)?),
            BinaryOp::NotEq => JsValue::Boolean(!self.loose_equality(left, right)?),
            BinaryOp::Lt => JsValue::Boolean(self.less_than(left, right, true)? == Some(true)),
            BinaryOp::Gt => JsValue::Boolean(self.less_than(right, left, false)? == Some(true)),
            BinaryOp::LtEq => JsValue::Boolean(self.less_than(right, left, false)? == Some(false)),
            BinaryOp::GtEq => JsValue::Boolean(self.less_than(left, right, true)? == Some(false)),
            BinaryOp::Instanceof => JsValue::Boolean(self.instance_of(left, right)?),
            BinaryOp::In => {
                if !right.is_object() {
                    return Err(self.type_error("Cannot use 'in' operator to search for a key in a non-object"));
                }
                let key = self.to_property_key(left)?;
                JsValue::Boolean(self.has_property(right, &key))
            }
            BinaryOp::Add => {
                let l = self.to_primitive(left, PreferredType::Default)?;
                let r = self.to_primitive(right, PreferredType::Default)?;
                if matches!(l, JsValue::String(_)) || matches!(r, JsValue::String(_)) {
                    let ls = self.to_js_string(&l)?;
                    let rs = self.to_js_string(&r)?;
                    JsValue::from(format!("{ls}{rs}"))
                } else {
                    self.arithmetic(op, &l, &r)?
                }
            }
            _ => self.arithmetic(op, left, right)?,
        })
    }

    fn arithmetic(&mut self, op: BinaryOp, left: &JsValue, right: &JsValue) -> EvalResult<JsValue> {
        let l = self.to_numeric(left)?;
        let r = self.to_numeric(right)?;
        match (l, r) {
            (Numeric::Number(a), Numeric::Number(b)) => Ok(JsValue::Number(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Mod => number_ops::remainder(a, b),
                BinaryOp::Exp => number_ops::exponentiate(a, b),
                BinaryOp::LShift => number_ops::left_shift(a, b),
                BinaryOp::RShift => number_ops::signed_right_shift(a, b),
                BinaryOp::URShift => number_ops::unsigned_right_shift(a, b),
                BinaryOp::BitAnd => number_ops::bitwise_and(a, b),
                BinaryOp::BitOr => number_ops::bitwise_or(a, b),
                BinaryOp::BitXor => number_ops::bitwise_xor(a, b),
                _ => return Err(EvalError::syntax(format!("Unsupported arithmetic operator {op:?}"))),
            })),
            (Numeric::BigInt(a), Numeric::BigInt(b)) => {
                let value = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => bigint_ops::divide(&a, &b).map_err(|m| self.range_error(m))?,
                    BinaryOp::Mod => bigint_ops::remainder(&a, &b).map_err(|m| self.range_error(m))?,
                    BinaryOp::Exp => bigint_ops::exponentiate(&a, &b).map_err(|m| self.range_error(m))?,
                    BinaryOp::LShift => bigint_ops::left_shift(&a, &b),
                    BinaryOp::RShift => bigint_ops::signed_right_shift(&a, &b),
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    BinaryOp::BitXor => a ^ b,
                    BinaryOp::URShift => {
                        return Err(self.type_error("BigInts have no unsigned right shift, use >> instead"));
                    }
                    _ => return Err(EvalError::syntax(format!("Unsupported arithmetic operator {op:?}"))),
                };
                Ok(JsValue::BigInt(JsBigInt { value }))
            }
            _ => Err(self.type_error("Cannot mix BigInt and other types, use explicit conversions")),
        }
    }

    pub(crate) fn unary_op(&mut self, op: UnaryOp, val: &JsValue) -> EvalResult<JsValue> {
        Ok(match op {
            UnaryOp::Not => JsValue::Boolean(!val.to_boolean()),
            UnaryOp::Plus => JsValue::Number(self.to_number(val)?),
            UnaryOp::Minus => match self.to_numeric(val)? {
                Numeric::Number(n) => JsValue::Number(number_ops::unary_minus(n)),
                Numeric::BigInt(b) => JsValue::BigInt(JsBigInt { value: -b }),
            },
            UnaryOp::BitNot => match self.to_numeric(val)? {
                Numeric::Number(n) => JsValue::Number(number_ops::bitwise_not(n)),
                Numeric::BigInt(b) => JsValue::BigInt(JsBigInt {
                    value: bigint_ops::bitwise_not(&b),
                }),
            },
        })
    }

    /// `++`/`--` on an already-read operand: returns (old numeric, new).
    pub(crate) fn update_value(&mut self, op: UpdateOp, val: &JsValue) -> EvalResult<(JsValue, JsValue)> {
        Ok(match self.to_numeric(val)? {
            Numeric::Number(n) => {
                let next = if op == UpdateOp::Increment { n + 1.0 } else { n - 1.0 };
                (JsValue::Number(n), JsValue::Number(next))
            }
            Numeric::BigInt(b) => {
                let next = if op == UpdateOp::Increment {
                    &b + BigInt::from(1)
                } else {
                    &b - BigInt::from(1)
                };
                (JsValue::BigInt(JsBigInt { value: b }), JsValue::BigInt(JsBigInt { value: next }))
            }
        })
    }

    /// Short description of a value for error messages.
    pub(crate) fn describe(&self, val: &JsValue) -> String {
        match val {
            JsValue::String(s) => format!("\"{s}\""),
            JsValue::Object(o) => match o.borrow().function() {
                Some(f) if !f.name().is_empty() => f.name().to_string(),
                Some(_) => "function".to_string(),
                None if o.is_array() => "array".to_string(),
                None => "object".to_string(),
            },
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typeof_table() {
        assert_eq!(typeof_value(&JsValue::Null), "object");
        assert_eq!(typeof_value(&JsValue::Undefined), "undefined");
        assert_eq!(typeof_value(&JsValue::from("x")), "string");
        assert_eq!(
            typeof_value(&JsValue::BigInt(JsBigInt { value: BigInt::from(1) })),
            "bigint"
        );
    }

    #[test]
    fn strict_equality_distinguishes_types() {
        assert!(strict_equality(&JsValue::from(1), &JsValue::from(1.0)));
        assert!(!strict_equality(&JsValue::from(1), &JsValue::from("1")));
        assert!(!strict_equality(&JsValue::Number(f64::NAN), &JsValue::Number(f64::NAN)));
        assert!(!strict_equality(&JsValue::Null, &JsValue::Undefined));
    }

    #[test]
    fn loose_equality_coerces() {
        let mut interp = Interpreter::new();
        assert!(interp.loose_equality(&JsValue::Null, &JsValue::Undefined).unwrap());
        assert!(interp.loose_equality(&JsValue::from("1"), &JsValue::from(1)).unwrap());
        assert!(interp.loose_equality(&JsValue::Boolean(true), &JsValue::from(1)).unwrap());
        assert!(!interp.loose_equality(&JsValue::Null, &JsValue::from(0)).unwrap());
    }

    #[test]
    fn addition_concatenates_strings() {
        let mut interp = Interpreter::new();
        let v = interp.binary_op(BinaryOp::Add, &JsValue::from("a"), &JsValue::from(1)).unwrap();
        assert_eq!(v.as_str(), Some("a1"));
        let v = interp.binary_op(BinaryOp::Add, &JsValue::from(2), &JsValue::from(3)).unwrap();
        assert_eq!(v.as_number(), Some(5.0));
    }

    #[test]
    fn relational_comparison_on_strings_and_nan() {
        let mut interp = Interpreter::new();
        let lt = interp.binary_op(BinaryOp::Lt, &JsValue::from("a"), &JsValue::from("b")).unwrap();
        assert!(lt.to_boolean());
        let ge = interp
            .binary_op(BinaryOp::GtEq, &JsValue::Number(f64::NAN), &JsValue::from(1))
            .unwrap();
        assert!(!ge.to_boolean());
    }

    #[test]
    fn bigint_operators_produce_bigints() {
        let mut interp = Interpreter::new();
        let r = interp.run("`${2n ** 64n} ${-(7n)} ${~0n} ${7n / 2n} ${typeof (1n + 2n)}`").unwrap();
        assert_eq!(r.to_string(), "18446744073709551616 -7 -1 3 bigint");
        let err = interp.run("1n / 0n").unwrap_err();
        assert!(err.to_string().starts_with("Uncaught RangeError"), "{err}");
    }

    #[test]
    fn mixing_bigint_and_number_throws() {
        let mut interp = Interpreter::new();
        let big = JsValue::BigInt(JsBigInt { value: BigInt::from(1) });
        assert!(matches!(
            interp.binary_op(BinaryOp::Mul, &big, &JsValue::from(2)),
            Err(EvalError::Thrown(_))
        ));
    }
}
