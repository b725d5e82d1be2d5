use crate::interpreter::{MAX_MATERIALIZED_LENGTH, ObjectData, ObjectKind};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    BigInt(JsBigInt),
    Object(JsObject),
}

/// Immutable guest string. Lengths and indices are measured in UTF-16 code
/// units, as guest code observes them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// The code unit at `index` as a one-unit string; lone surrogates come
    /// back as U+FFFD.
    pub fn char_at(&self, index: usize) -> Option<JsString> {
        let unit = self.0.encode_utf16().nth(index)?;
        Some(JsString::from(String::from_utf16_lossy(&[unit])))
    }

    /// Splits into per-character strings for iteration (code points, not
    /// code units).
    pub fn chars(&self) -> impl Iterator<Item = JsString> + '_ {
        self.0.chars().map(|c| JsString::from(c.to_string()))
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(Rc::from(s))
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(Rc::from(s))
    }
}

impl From<Rc<str>> for JsString {
    fn from(s: Rc<str>) -> Self {
        JsString(s)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct JsSymbol {
    pub id: u64,
    pub description: Option<JsString>,
}

/// Ids below this are reserved for well-known symbols.
pub const FIRST_USER_SYMBOL_ID: u64 = 16;

impl JsSymbol {
    pub fn iterator() -> Self {
        JsSymbol {
            id: 1,
            description: Some(JsString::from("Symbol.iterator")),
        }
    }

    pub fn async_iterator() -> Self {
        JsSymbol {
            id: 2,
            description: Some(JsString::from("Symbol.asyncIterator")),
        }
    }

    /// Convert to the internal property key string.
    /// Well-known symbols (description starts with "Symbol.") use a stable format
    /// without id, so hardcoded lookups like "Symbol(Symbol.iterator)" still work.
    /// User-created symbols include the unique id to avoid collisions.
    pub fn to_property_key(&self) -> String {
        match &self.description {
            Some(desc) if self.id < FIRST_USER_SYMBOL_ID => format!("Symbol({desc})"),
            Some(desc) => format!("Symbol({desc})#{}", self.id),
            None => format!("Symbol()#{}", self.id),
        }
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JsBigInt {
    pub value: num_bigint::BigInt,
}

/// Shared handle to a guest object. Two handles are equal when they point at
/// the same object.
#[derive(Clone)]
pub struct JsObject(Rc<RefCell<ObjectData>>);

impl JsObject {
    pub fn new(data: ObjectData) -> Self {
        JsObject(Rc::new(RefCell::new(data)))
    }

    pub fn borrow(&self) -> Ref<'_, ObjectData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ObjectData> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn prototype(&self) -> Option<JsObject> {
        self.0.borrow().prototype.clone()
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Array(_))
    }
}

impl PartialEq for JsObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => write!(f, "JsObject({})", data.kind.name()),
            Err(_) => f.write_str("JsObject(<borrowed>)"),
        }
    }
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsValue::Null)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, JsValue::Object(o) if o.is_callable())
    }

    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            JsValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) | JsValue::Object(_) => true,
            JsValue::BigInt(b) => b.value != num_bigint::BigInt::from(0),
        }
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<usize> for JsValue {
    fn from(n: usize) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObject> for JsValue {
    fn from(o: JsObject) -> Self {
        JsValue::Object(o)
    }
}

pub mod number_ops {
    pub fn unary_minus(x: f64) -> f64 {
        if x.is_nan() { f64::NAN } else { -x }
    }

    pub fn bitwise_not(x: f64) -> f64 {
        let n = to_int32(x);
        f64::from(!n)
    }

    pub fn exponentiate(base: f64, exp: f64) -> f64 {
        if exp.is_nan() || (base.abs() == 1.0 && exp.is_infinite()) {
            return f64::NAN;
        }
        base.powf(exp)
    }

    pub fn remainder(x: f64, y: f64) -> f64 {
        // Truncating remainder; the sign follows the dividend.
        x % y
    }

    pub fn left_shift(x: f64, y: f64) -> f64 {
        let lnum = to_int32(x);
        let shift = to_uint32(y) & 0x1F;
        f64::from(lnum.wrapping_shl(shift))
    }

    pub fn signed_right_shift(x: f64, y: f64) -> f64 {
        let lnum = to_int32(x);
        let shift = to_uint32(y) & 0x1F;
        f64::from(lnum.wrapping_shr(shift))
    }

    pub fn unsigned_right_shift(x: f64, y: f64) -> f64 {
        let lnum = to_uint32(x);
        let shift = to_uint32(y) & 0x1F;
        f64::from(lnum.wrapping_shr(shift))
    }

    /// `None` when either side is NaN.
    pub fn less_than(x: f64, y: f64) -> Option<bool> {
        if x.is_nan() || y.is_nan() {
            None
        } else {
            Some(x < y)
        }
    }

    pub fn same_value_zero(x: f64, y: f64) -> bool {
        if x.is_nan() && y.is_nan() {
            return true;
        }
        x == y
    }

    pub fn bitwise_and(x: f64, y: f64) -> f64 {
        f64::from(to_int32(x) & to_int32(y))
    }

    pub fn bitwise_xor(x: f64, y: f64) -> f64 {
        f64::from(to_int32(x) ^ to_int32(y))
    }

    pub fn bitwise_or(x: f64, y: f64) -> f64 {
        f64::from(to_int32(x) | to_int32(y))
    }

    pub fn to_string(x: f64) -> String {
        if x.is_nan() {
            return "NaN".to_string();
        }
        if x == 0.0 {
            return "0".to_string();
        }
        if x.is_infinite() {
            return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
        }
        let mut buf = ryu_js::Buffer::new();
        buf.format(x).to_string()
    }

    /// String-to-number conversion: surrounding whitespace is ignored, the
    /// empty string is 0, and anything unparsable is NaN.
    pub fn from_str(s: &str) -> f64 {
        let s = s.trim();
        if s.is_empty() {
            return 0.0;
        }
        let radix = match s.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            return u64::from_str_radix(&s[2..], radix).map_or(f64::NAN, |n| n as f64);
        }
        match s {
            "Infinity" | "+Infinity" => return f64::INFINITY,
            "-Infinity" => return f64::NEG_INFINITY,
            _ => {}
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        {
            return f64::NAN;
        }
        s.parse::<f64>().unwrap_or(f64::NAN)
    }

    /// The canonical array index a property key denotes, if any.
    pub fn to_array_index(key: &str) -> Option<usize> {
        if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
            return None;
        }
        if !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        key.parse::<u32>().ok().filter(|&n| n != u32::MAX).map(|n| n as usize)
    }

    pub fn to_int32(x: f64) -> i32 {
        if x.is_nan() || x.is_infinite() || x == 0.0 {
            return 0;
        }
        let int_val = x.trunc();
        (int_val as i64 as u32) as i32
    }

    pub fn to_uint32(x: f64) -> u32 {
        if x.is_nan() || x.is_infinite() || x == 0.0 {
            return 0;
        }
        let int_val = x.trunc();
        int_val as i64 as u32
    }
}

pub mod bigint_ops {
    use num_bigint::BigInt;

    pub fn bitwise_not(x: &BigInt) -> BigInt {
        // ~x = -(x + 1) for arbitrary precision
        let result: BigInt = x + 1;
        -result
    }

    pub fn exponentiate(base: &BigInt, exp: &BigInt) -> Result<BigInt, &'static str> {
        use num_bigint::Sign;
        if exp.sign() == Sign::Minus {
            return Err("Exponent must be non-negative");
        }
        let exp_u32: u32 = exp.try_into().map_err(|_| "Maximum BigInt size exceeded")?;
        Ok(base.pow(exp_u32))
    }

    pub fn divide(x: &BigInt, y: &BigInt) -> Result<BigInt, &'static str> {
        if y.sign() == num_bigint::Sign::NoSign {
            return Err("Division by zero");
        }
        Ok(x / y)
    }

    pub fn remainder(x: &BigInt, y: &BigInt) -> Result<BigInt, &'static str> {
        if y.sign() == num_bigint::Sign::NoSign {
            return Err("Division by zero");
        }
        Ok(x % y)
    }

    pub fn left_shift(x: &BigInt, y: &BigInt) -> BigInt {
        let shift: i64 = y.try_into().unwrap_or(0);
        if shift >= 0 {
            x << (shift as u64)
        } else {
            x >> ((-shift) as u64)
        }
    }

    pub fn signed_right_shift(x: &BigInt, y: &BigInt) -> BigInt {
        let shift: i64 = y.try_into().unwrap_or(0);
        if shift >= 0 {
            x >> (shift as u64)
        } else {
            x << ((-shift) as u64)
        }
    }

    /// Parses the digits of a BigInt literal (prefix allowed, no `n`).
    pub fn parse_literal(digits: &str) -> Option<BigInt> {
        let digits = digits.replace('_', "");
        let (radix, body) = match digits.get(..2) {
            Some("0x" | "0X") => (16, &digits[2..]),
            Some("0o" | "0O") => (8, &digits[2..]),
            Some("0b" | "0B") => (2, &digits[2..]),
            _ => (10, digits.as_str()),
        };
        BigInt::parse_bytes(body.as_bytes(), radix)
    }
}

thread_local! {
    static JOINING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks an array as being joined; a cycle back to it renders as empty.
struct JoinGuard(usize);

impl JoinGuard {
    fn enter(object: &JsObject) -> Option<Self> {
        let id = Rc::as_ptr(&object.0) as usize;
        JOINING.with(|joining| {
            let mut joining = joining.borrow_mut();
            if joining.contains(&id) {
                return None;
            }
            joining.push(id);
            Some(JoinGuard(id))
        })
    }
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        JOINING.with(|joining| joining.borrow_mut().retain(|&id| id != self.0));
    }
}

/// Elements joined with commas; holes and nullish values print empty.
fn write_array(array: &JsObject, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (len, values) = {
        let data = array.borrow();
        (data.array_length().unwrap_or(0), data.indexed_values())
    };
    if len > MAX_MATERIALIZED_LENGTH {
        return write!(f, "Array({len})");
    }
    let Some(_guard) = JoinGuard::enter(array) else {
        return Ok(());
    };
    let mut parts = vec![String::new(); len];
    for (i, v) in values {
        if i < len && !v.is_nullish() {
            parts[i] = crate::stack::ensure_sufficient_stack(|| v.to_string());
        }
    }
    write!(f, "{}", parts.join(","))
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => write!(f, "{}", number_ops::to_string(*n)),
            JsValue::String(s) => write!(f, "{s}"),
            JsValue::Symbol(s) => {
                if let Some(desc) = &s.description {
                    write!(f, "Symbol({desc})")
                } else {
                    write!(f, "Symbol()")
                }
            }
            JsValue::BigInt(b) => write!(f, "{}", b.value),
            JsValue::Object(o) if o.is_array() => write_array(o, f),
            JsValue::Object(o) => {
                let data = o.borrow();
                match &data.kind {
                    ObjectKind::Function(func) => write!(f, "function {}() {{ [native code] }}", func.name()),
                    ObjectKind::Error => {
                        let mut name = data.get_own_value("name");
                        let mut proto = data.prototype.clone();
                        while name.is_none()
                            && let Some(p) = proto
                        {
                            name = p.borrow().get_own_value("name");
                            proto = p.prototype();
                        }
                        let name = name.unwrap_or(JsValue::from("Error"));
                        let message = data.get_own_value("message").unwrap_or_default();
                        if message.to_string().is_empty() {
                            write!(f, "{name}")
                        } else {
                            write!(f, "{name}: {message}")
                        }
                    }
                    _ => write!(f, "[object Object]"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_to_string() {
        assert_eq!(number_ops::to_string(1.0), "1");
        assert_eq!(number_ops::to_string(-0.0), "0");
        assert_eq!(number_ops::to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_ops::to_string(1e21), "1e+21");
        assert_eq!(number_ops::to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_to_number() {
        assert_eq!(number_ops::from_str("  42 "), 42.0);
        assert_eq!(number_ops::from_str(""), 0.0);
        assert_eq!(number_ops::from_str("0x1f"), 31.0);
        assert!(number_ops::from_str("inf").is_nan());
        assert!(number_ops::from_str("12px").is_nan());
        assert_eq!(number_ops::from_str("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn int32_wrapping() {
        assert_eq!(number_ops::to_int32(4294967296.0 + 5.0), 5);
        assert_eq!(number_ops::to_int32(-1.5), -1);
        assert_eq!(number_ops::unsigned_right_shift(-1.0, 0.0), 4294967295.0);
        assert_eq!(number_ops::left_shift(1.0, 33.0), 2.0);
    }

    #[test]
    fn exponent_edge_cases() {
        assert!(number_ops::exponentiate(1.0, f64::NAN).is_nan());
        assert!(number_ops::exponentiate(-1.0, f64::INFINITY).is_nan());
        assert_eq!(number_ops::exponentiate(2.0, 10.0), 1024.0);
    }

    #[test]
    fn array_index_keys() {
        assert_eq!(number_ops::to_array_index("0"), Some(0));
        assert_eq!(number_ops::to_array_index("17"), Some(17));
        assert_eq!(number_ops::to_array_index("01"), None);
        assert_eq!(number_ops::to_array_index("-1"), None);
        assert_eq!(number_ops::to_array_index("length"), None);
    }

    #[test]
    fn bigint_literals_and_ops() {
        let big = bigint_ops::parse_literal("0xff").unwrap();
        assert_eq!(big, num_bigint::BigInt::from(255));
        assert_eq!(bigint_ops::bitwise_not(&big), num_bigint::BigInt::from(-256));
        assert!(bigint_ops::divide(&big, &num_bigint::BigInt::from(0)).is_err());
    }

    #[test]
    fn symbol_keys() {
        assert_eq!(JsSymbol::iterator().to_property_key(), "Symbol(Symbol.iterator)");
        let user = JsSymbol {
            id: 20,
            description: Some(JsString::from("tag")),
        };
        assert_eq!(user.to_property_key(), "Symbol(tag)#20");
    }

    #[test]
    fn utf16_lengths() {
        let s = JsString::from("a😀");
        assert_eq!(s.len(), 3);
        assert_eq!(s.char_at(0).unwrap().as_str(), "a");
        assert_eq!(s.chars().count(), 2);
    }

    #[test]
    fn truthiness() {
        assert!(!JsValue::from("").to_boolean());
        assert!(JsValue::from("0").to_boolean());
        assert!(!JsValue::Number(f64::NAN).to_boolean());
        assert!(!JsValue::Null.to_boolean());
    }
}
