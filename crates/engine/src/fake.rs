//! In-memory engine implementing the whole function table
//!
//! Used by the test suites of this workspace in place of the native engine.
//! It behaves like the real one where it matters to the adapter:
//!
//! - one error slot per context, which stays set until `error_clear`
//! - names unique per class (case-insensitive), positions 1-based
//! - property writes outside an edit session apply immediately; the
//!   recalculation only happens on `end_edit`
//! - every returned buffer is tracked until disposed, so tests can assert
//!   that nothing leaks
//!
//! # Registered classes
//!
//! | Index | Class   | Properties                                                   |
//! |-------|---------|--------------------------------------------------------------|
//! | 1     | Widget  | Rating f64 (>= 0), Count, Enabled, Label, Peer, Weights,     |
//! |       |         | Codes, Tags, Links, Mode (Off/Auto/Manual)                   |
//! | 2     | Gadget  | Power f64, Owner, Enabled                                    |
//! | 3     | Monitor | Element, Terminal, Enabled                                   |

use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

use dssobj_sdk::{
    json_bits, ContextPtr, DssFunctionTable, NativeBool, ObjectPtr, FUNCTION_TABLE_VERSION,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::globals::{get_or_init_api, EngineApi};
use crate::loader::load_function_table;

/// Class index of `Widget`
pub const WIDGET: i32 = 1;
/// Class index of `Gadget`
pub const GADGET: i32 = 2;
/// Class index of `Monitor`
pub const MONITOR: i32 = 3;

pub const ERR_INVALID_CLASS: i32 = 101;
pub const ERR_INVALID_PROPERTY: i32 = 102;
pub const ERR_DUPLICATE_NAME: i32 = 103;
pub const ERR_INVALID_VALUE: i32 = 104;
pub const ERR_TYPE: i32 = 105;
pub const ERR_EDIT_STATE: i32 = 106;
pub const ERR_UNKNOWN_REFERENCE: i32 = 107;
pub const ERR_FOREIGN_OBJECT: i32 = 108;
pub const ERR_INVALID_NAME: i32 = 109;

// ----------------------------------------------------------------------
// Class table
// ----------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Bool,
    Int,
    Enum(&'static [&'static str]),
    Float,
    Text,
    Object,
    IntArray,
    FloatArray,
    TextArray,
    ObjectArray,
}

struct FakeProp {
    index: i32,
    name: &'static str,
    kind: Kind,
    min: Option<f64>,
}

struct FakeClass {
    index: i32,
    name: &'static str,
    props: &'static [FakeProp],
}

impl FakeClass {
    fn prop(&self, index: i32) -> Option<&'static FakeProp> {
        let props: &'static [FakeProp] = self.props;
        props.iter().find(|p| p.index == index)
    }

    fn prop_named(&self, name: &str) -> Option<&'static FakeProp> {
        let props: &'static [FakeProp] = self.props;
        props.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

const fn prop(index: i32, name: &'static str, kind: Kind) -> FakeProp {
    FakeProp {
        index,
        name,
        kind,
        min: None,
    }
}

static CLASSES: [FakeClass; 3] = [
    FakeClass {
        index: WIDGET,
        name: "Widget",
        props: &[
            FakeProp {
                index: 1,
                name: "Rating",
                kind: Kind::Float,
                min: Some(0.0),
            },
            prop(2, "Count", Kind::Int),
            prop(3, "Enabled", Kind::Bool),
            prop(4, "Label", Kind::Text),
            prop(5, "Peer", Kind::Object),
            prop(6, "Weights", Kind::FloatArray),
            prop(7, "Codes", Kind::IntArray),
            prop(8, "Tags", Kind::TextArray),
            prop(9, "Links", Kind::ObjectArray),
            prop(10, "Mode", Kind::Enum(&["Off", "Auto", "Manual"])),
        ],
    },
    FakeClass {
        index: GADGET,
        name: "Gadget",
        props: &[
            prop(1, "Power", Kind::Float),
            prop(2, "Owner", Kind::Object),
            prop(3, "Enabled", Kind::Bool),
        ],
    },
    FakeClass {
        index: MONITOR,
        name: "Monitor",
        props: &[
            prop(1, "Element", Kind::Object),
            prop(2, "Terminal", Kind::Int),
            prop(3, "Enabled", Kind::Bool),
        ],
    },
];

fn class_by_index(index: i32) -> Option<&'static FakeClass> {
    CLASSES.iter().find(|c| c.index == index)
}

fn class_by_name(name: &str) -> Option<&'static FakeClass> {
    CLASSES.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

// ----------------------------------------------------------------------
// Engine state
// ----------------------------------------------------------------------

#[derive(Clone)]
enum FakeValue {
    Int(i32),
    Float(f64),
    Text(String),
    Object(ObjectPtr),
    IntArray(Vec<i32>),
    FloatArray(Vec<f64>),
    TextArray(Vec<String>),
    ObjectArray(Vec<ObjectPtr>),
}

impl FakeValue {
    fn default_for(kind: Kind) -> Self {
        match kind {
            // Objects start enabled
            Kind::Bool => FakeValue::Int(1),
            Kind::Int | Kind::Enum(_) => FakeValue::Int(0),
            Kind::Float => FakeValue::Float(0.0),
            Kind::Text => FakeValue::Text(String::new()),
            Kind::Object => FakeValue::Object(ptr::null_mut()),
            Kind::IntArray => FakeValue::IntArray(Vec::new()),
            Kind::FloatArray => FakeValue::FloatArray(Vec::new()),
            Kind::TextArray => FakeValue::TextArray(Vec::new()),
            Kind::ObjectArray => FakeValue::ObjectArray(Vec::new()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            FakeValue::Object(p) => p.is_null(),
            FakeValue::IntArray(v) => v.is_empty(),
            FakeValue::FloatArray(v) => v.is_empty(),
            FakeValue::TextArray(v) => v.is_empty(),
            FakeValue::ObjectArray(v) => v.is_empty(),
            _ => false,
        }
    }
}

struct FakeContext {
    id: u64,
    objects: Vec<Box<FakeObject>>,
    error_code: i32,
    error_text: CString,
}

struct FakeObject {
    ctx: *mut FakeContext,
    class: &'static FakeClass,
    name: String,
    c_name: CString,
    values: HashMap<i32, FakeValue>,
    set_order: Vec<i32>,
    editing: bool,
    recalcs: u32,
    last_changes: i32,
    last_flags: u32,
}

impl FakeObject {
    fn value(&self, prop: &FakeProp) -> FakeValue {
        self.values
            .get(&prop.index)
            .cloned()
            .unwrap_or_else(|| FakeValue::default_for(prop.kind))
    }

    fn store(&mut self, index: i32, value: FakeValue, flags: u32) {
        if !self.set_order.contains(&index) {
            self.set_order.push(index);
        }
        self.values.insert(index, value);
        self.last_flags = flags;
    }

    fn is_enabled(&self) -> bool {
        match self.class.prop_named("Enabled") {
            Some(p) => !matches!(self.value(p), FakeValue::Int(0)),
            None => true,
        }
    }
}

type Fault = (i32, String);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
static INVALID_DISPOSALS: AtomicUsize = AtomicUsize::new(0);

/// Outstanding engine buffers: address -> owning context id
fn buffers() -> &'static Mutex<HashMap<usize, u64>> {
    static BUFFERS: OnceLock<Mutex<HashMap<usize, u64>>> = OnceLock::new();
    BUFFERS.get_or_init(Default::default)
}

fn track(addr: usize, ctx_id: u64) {
    buffers().lock().insert(addr, ctx_id);
}

fn untrack(addr: usize) -> bool {
    if buffers().lock().remove(&addr).is_some() {
        true
    } else {
        INVALID_DISPOSALS.fetch_add(1, Ordering::SeqCst);
        false
    }
}

// ----------------------------------------------------------------------
// Raw pointer helpers
// ----------------------------------------------------------------------

unsafe fn context<'a>(ctx: ContextPtr) -> Option<&'a mut FakeContext> {
    (ctx as *mut FakeContext).as_mut()
}

/// Owning context and class of an object
unsafe fn header(obj: ObjectPtr) -> Option<(*mut FakeContext, &'static FakeClass)> {
    let o = (obj as *const FakeObject).as_ref()?;
    Some((o.ctx, o.class))
}

unsafe fn fail(ctx: *mut FakeContext, (code, message): Fault) {
    if let Some(ctx) = ctx.as_mut() {
        ctx.error_code = code;
        ctx.error_text = CString::new(message).unwrap_or_default();
    }
}

unsafe fn property(
    ctx: *mut FakeContext,
    class: &'static FakeClass,
    index: i32,
) -> Option<&'static FakeProp> {
    let found = class.prop(index);
    if found.is_none() {
        fail(
            ctx,
            (
                ERR_INVALID_PROPERTY,
                format!("Invalid property index {} for class {}", index, class.name),
            ),
        );
    }
    found
}

/// Read a property value, recording a fault for bad indices
unsafe fn read(obj: ObjectPtr, index: i32) -> Option<(*mut FakeContext, &'static FakeProp, FakeValue)> {
    let (ctx, class) = header(obj)?;
    let prop = property(ctx, class, index)?;
    let value = (*(obj as *const FakeObject)).value(prop);
    Some((ctx, prop, value))
}

/// Convert and store a property value, recording a fault on failure
unsafe fn write<F>(obj: ObjectPtr, index: i32, flags: u32, convert: F)
where
    F: FnOnce(*mut FakeContext, &'static FakeProp) -> Result<FakeValue, Fault>,
{
    let Some((ctx, class)) = header(obj) else {
        return;
    };
    let Some(prop) = property(ctx, class, index) else {
        return;
    };
    match convert(ctx, prop) {
        Ok(value) => (*(obj as *mut FakeObject)).store(prop.index, value, flags),
        Err(fault) => fail(ctx, fault),
    }
}

/// Unwrap a getter result, recording the fault and returning `default`
unsafe fn settle<T>(ctx: *mut FakeContext, result: Result<T, Fault>, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(fault) => {
            fail(ctx, fault);
            default
        }
    }
}

unsafe fn ctx_id_of(ctx: *mut FakeContext) -> u64 {
    ctx.as_ref().map(|c| c.id).unwrap_or(0)
}

unsafe fn read_str<'a>(value: *const c_char) -> Option<&'a str> {
    if value.is_null() {
        return None;
    }
    CStr::from_ptr(value).to_str().ok()
}

unsafe fn host_slice<'a, T>(values: *const T, count: i32) -> Result<&'a [T], Fault> {
    if count < 0 || (values.is_null() && count > 0) {
        return Err((ERR_INVALID_VALUE, format!("Invalid element count {}", count)));
    }
    if count == 0 {
        return Ok(&[]);
    }
    Ok(std::slice::from_raw_parts(values, count as usize))
}

fn alloc_string(ctx_id: u64, value: &str) -> *mut c_char {
    let raw = CString::new(value.replace('\0', ""))
        .unwrap_or_default()
        .into_raw();
    track(raw as usize, ctx_id);
    raw
}

unsafe fn alloc_array<T>(ctx_id: u64, values: Vec<T>, result: *mut *mut T, count: *mut i32) {
    if result.is_null() || count.is_null() {
        return;
    }
    if values.is_empty() {
        *result = ptr::null_mut();
        *count = 0;
        return;
    }
    let len = values.len() as i32;
    let raw = Box::into_raw(values.into_boxed_slice()) as *mut T;
    track(raw as usize, ctx_id);
    *result = raw;
    *count = len;
}

unsafe fn release_array<T>(values: *mut T, count: i32) -> Option<Box<[T]>> {
    if values.is_null() || count < 0 || !untrack(values as usize) {
        return None;
    }
    Some(Box::from_raw(ptr::slice_from_raw_parts_mut(
        values,
        count as usize,
    )))
}

// ----------------------------------------------------------------------
// Value conversion
// ----------------------------------------------------------------------

fn type_fault(prop: &FakeProp, wanted: &str) -> Fault {
    (
        ERR_TYPE,
        format!("Property {} does not accept {}", prop.name, wanted),
    )
}

fn check_min(prop: &FakeProp, value: f64) -> Result<(), Fault> {
    match prop.min {
        Some(min) if value < min => Err((
            ERR_INVALID_VALUE,
            format!("{} must be at least {}, got {}", prop.name, min, value),
        )),
        _ => Ok(()),
    }
}

fn enum_value(prop: &FakeProp, names: &[&str], value: i32) -> Result<FakeValue, Fault> {
    if value < 0 || value as usize >= names.len() {
        return Err((
            ERR_INVALID_VALUE,
            format!("Invalid value {} for {}", value, prop.name),
        ));
    }
    Ok(FakeValue::Int(value))
}

fn from_f64(prop: &FakeProp, value: f64) -> Result<FakeValue, Fault> {
    match prop.kind {
        Kind::Float => {
            check_min(prop, value)?;
            Ok(FakeValue::Float(value))
        }
        Kind::Int => Ok(FakeValue::Int(value as i32)),
        Kind::Bool => Ok(FakeValue::Int((value != 0.0) as i32)),
        Kind::Enum(names) => enum_value(prop, names, value as i32),
        _ => Err(type_fault(prop, "a number")),
    }
}

fn from_i32(prop: &FakeProp, value: i32) -> Result<FakeValue, Fault> {
    match prop.kind {
        Kind::Float => from_f64(prop, value as f64),
        Kind::Int => Ok(FakeValue::Int(value)),
        Kind::Bool => Ok(FakeValue::Int((value != 0) as i32)),
        Kind::Enum(names) => enum_value(prop, names, value),
        _ => Err(type_fault(prop, "an integer")),
    }
}

fn as_f64(prop: &FakeProp, value: &FakeValue) -> Result<f64, Fault> {
    match value {
        FakeValue::Float(f) => Ok(*f),
        FakeValue::Int(i) => Ok(*i as f64),
        _ => Err(type_fault(prop, "numeric reads")),
    }
}

fn as_i32(prop: &FakeProp, value: &FakeValue) -> Result<i32, Fault> {
    match value {
        FakeValue::Int(i) => Ok(*i),
        FakeValue::Float(f) => Ok(*f as i32),
        _ => Err(type_fault(prop, "integer reads")),
    }
}

/// Split `[a, b, c]` / `a b c` style lists
fn split_list(text: &str) -> Vec<&str> {
    let inner = text
        .trim()
        .trim_start_matches(['[', '(', '"'])
        .trim_end_matches([']', ')', '"'])
        .trim();
    if inner.is_empty() {
        return Vec::new();
    }
    if inner.contains(',') {
        inner.split(',').map(str::trim).collect()
    } else {
        inner.split_whitespace().collect()
    }
}

fn parse_f64(prop: &FakeProp, text: &str) -> Result<f64, Fault> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| (ERR_INVALID_VALUE, format!("Cannot parse {:?} for {}", text, prop.name)))
}

fn parse_i32(prop: &FakeProp, text: &str) -> Result<i32, Fault> {
    let text = text.trim();
    match text.parse::<i32>() {
        Ok(v) => Ok(v),
        Err(_) => parse_f64(prop, text).map(|v| v as i32),
    }
}

/// Find an object by `Name` or `Class.Name`
unsafe fn resolve(ctx: *mut FakeContext, reference: &str) -> Result<ObjectPtr, Fault> {
    let reference = reference.trim();
    let (class, name) = match reference.split_once('.') {
        Some((class, name)) => match class_by_name(class) {
            Some(c) => (Some(c.index), name),
            None => (None, reference),
        },
        None => (None, reference),
    };
    let found = ctx.as_ref().and_then(|ctx| {
        ctx.objects
            .iter()
            .find(|o| class.map_or(true, |c| o.class.index == c) && o.name.eq_ignore_ascii_case(name))
            .map(|o| &**o as *const FakeObject as ObjectPtr)
    });
    found.ok_or((
        ERR_UNKNOWN_REFERENCE,
        format!("Object {:?} not found", reference),
    ))
}

unsafe fn belongs_to(ctx: *mut FakeContext, obj: ObjectPtr) -> bool {
    obj.is_null() || header(obj).map_or(false, |(owner, _)| owner == ctx)
}

unsafe fn from_str(ctx: *mut FakeContext, prop: &FakeProp, text: &str) -> Result<FakeValue, Fault> {
    match prop.kind {
        Kind::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(FakeValue::Int(1)),
            "false" | "no" | "n" | "0" => Ok(FakeValue::Int(0)),
            _ => Err((ERR_INVALID_VALUE, format!("Cannot parse {:?} as boolean", text))),
        },
        Kind::Int => parse_i32(prop, text).map(FakeValue::Int),
        Kind::Enum(names) => match names.iter().position(|n| n.eq_ignore_ascii_case(text.trim())) {
            Some(pos) => Ok(FakeValue::Int(pos as i32)),
            None => enum_value(prop, names, parse_i32(prop, text)?),
        },
        Kind::Float => from_f64(prop, parse_f64(prop, text)?),
        Kind::Text => Ok(FakeValue::Text(text.to_string())),
        Kind::Object => {
            if text.trim().is_empty() {
                Ok(FakeValue::Object(ptr::null_mut()))
            } else {
                resolve(ctx, text).map(FakeValue::Object)
            }
        }
        Kind::IntArray => split_list(text)
            .into_iter()
            .map(|item| parse_i32(prop, item))
            .collect::<Result<_, _>>()
            .map(FakeValue::IntArray),
        Kind::FloatArray => split_list(text)
            .into_iter()
            .map(|item| parse_f64(prop, item))
            .collect::<Result<_, _>>()
            .map(FakeValue::FloatArray),
        Kind::TextArray => Ok(FakeValue::TextArray(
            split_list(text).into_iter().map(str::to_string).collect(),
        )),
        Kind::ObjectArray => split_list(text)
            .into_iter()
            .map(|item| resolve(ctx, item))
            .collect::<Result<_, _>>()
            .map(FakeValue::ObjectArray),
    }
}

unsafe fn ref_name(obj: ObjectPtr, full: bool) -> String {
    match (obj as *const FakeObject).as_ref() {
        Some(o) if full => format!("{}.{}", o.class.name, o.name),
        Some(o) => o.name.clone(),
        None => String::new(),
    }
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    let items: Vec<String> = items.map(|i| i.to_string()).collect();
    format!("[{}]", items.join(", "))
}

unsafe fn to_text(prop: &FakeProp, value: &FakeValue) -> String {
    match (prop.kind, value) {
        (Kind::Bool, FakeValue::Int(i)) => (if *i != 0 { "true" } else { "false" }).to_string(),
        (Kind::Enum(names), FakeValue::Int(i)) => names.get(*i as usize).copied().unwrap_or("").to_string(),
        (_, FakeValue::Int(i)) => i.to_string(),
        (_, FakeValue::Float(f)) => f.to_string(),
        (_, FakeValue::Text(s)) => s.clone(),
        (_, FakeValue::Object(p)) => ref_name(*p, false),
        (_, FakeValue::IntArray(v)) => join(v.iter()),
        (_, FakeValue::FloatArray(v)) => join(v.iter()),
        (_, FakeValue::TextArray(v)) => join(v.iter()),
        (_, FakeValue::ObjectArray(v)) => join(v.iter().map(|p| ref_name(*p, false))),
    }
}

unsafe fn to_json_value(prop: &FakeProp, value: &FakeValue, options: u32) -> Value {
    let full_names = options & json_bits::FULL_NAMES != 0;
    match (prop.kind, value) {
        (Kind::Bool, FakeValue::Int(i)) => json!(*i != 0),
        (Kind::Enum(names), FakeValue::Int(i)) => {
            if options & json_bits::ENUM_AS_INT != 0 {
                json!(i)
            } else {
                json!(names.get(*i as usize).copied().unwrap_or(""))
            }
        }
        (_, FakeValue::Int(i)) => json!(i),
        (_, FakeValue::Float(f)) => json!(f),
        (_, FakeValue::Text(s)) => json!(s),
        (_, FakeValue::Object(p)) if p.is_null() => Value::Null,
        (_, FakeValue::Object(p)) => json!(ref_name(*p, full_names)),
        (_, FakeValue::IntArray(v)) => json!(v),
        (_, FakeValue::FloatArray(v)) => json!(v),
        (_, FakeValue::TextArray(v)) => json!(v),
        (_, FakeValue::ObjectArray(v)) => {
            Value::Array(v.iter().map(|p| json!(ref_name(*p, full_names))).collect())
        }
    }
}

unsafe fn object_json(o: &FakeObject, options: u32) -> Value {
    let mut map = Map::new();
    if options & json_bits::SKIP_CLASS_TAG == 0 {
        map.insert("DSSClass".into(), json!(o.class.name));
    }
    map.insert("Name".into(), json!(o.name));

    let full = options & json_bits::FULL != 0;
    let indices: Vec<i32> = if full {
        o.class.props.iter().map(|p| p.index).collect()
    } else {
        o.set_order.clone()
    };
    for index in indices {
        let Some(prop) = o.class.prop(index) else {
            continue;
        };
        let value = o.value(prop);
        if full && options & json_bits::SKIP_REDUNDANT != 0 && value.is_empty() {
            continue;
        }
        map.insert(prop.name.into(), to_json_value(prop, &value, options));
    }
    Value::Object(map)
}

fn render(value: &Value, options: u32) -> String {
    let rendered = if options & json_bits::PRETTY != 0 {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_default()
}

// ----------------------------------------------------------------------
// Table entries
// ----------------------------------------------------------------------

unsafe extern "C" fn fake_ctx_new() -> ContextPtr {
    let ctx = Box::new(FakeContext {
        id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::SeqCst),
        objects: Vec::new(),
        error_code: 0,
        error_text: CString::default(),
    });
    Box::into_raw(ctx) as ContextPtr
}

unsafe extern "C" fn fake_ctx_dispose(ctx: ContextPtr) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx as *mut FakeContext));
    }
}

unsafe extern "C" fn fake_clear_all(ctx: ContextPtr) {
    if let Some(ctx) = context(ctx) {
        ctx.objects.clear();
    }
}

unsafe extern "C" fn fake_error_get_number(ctx: ContextPtr) -> i32 {
    context(ctx).map_or(0, |c| c.error_code)
}

unsafe extern "C" fn fake_error_get_description(ctx: ContextPtr) -> *const c_char {
    context(ctx).map_or(ptr::null(), |c| c.error_text.as_ptr())
}

unsafe extern "C" fn fake_error_clear(ctx: ContextPtr) {
    if let Some(ctx) = context(ctx) {
        ctx.error_code = 0;
        ctx.error_text = CString::default();
    }
}

unsafe extern "C" fn fake_new_object(
    ctx: ContextPtr,
    cls_idx: i32,
    name: *const c_char,
    _activate: NativeBool,
    begin_edit: NativeBool,
) -> ObjectPtr {
    let raw_ctx = ctx as *mut FakeContext;
    let Some(class) = class_by_index(cls_idx) else {
        fail(raw_ctx, (ERR_INVALID_CLASS, format!("Invalid class index {}", cls_idx)));
        return ptr::null_mut();
    };
    let name = match read_str(name) {
        Some(n) if !n.trim().is_empty() => n.to_string(),
        _ => {
            fail(raw_ctx, (ERR_INVALID_NAME, "Object name must not be empty".into()));
            return ptr::null_mut();
        }
    };
    let Some(ctx) = context(ctx) else {
        return ptr::null_mut();
    };
    let duplicate = ctx
        .objects
        .iter()
        .any(|o| o.class.index == cls_idx && o.name.eq_ignore_ascii_case(&name));
    if duplicate {
        ctx.error_code = ERR_DUPLICATE_NAME;
        ctx.error_text = CString::new(format!("{}.{} already exists", class.name, name))
            .unwrap_or_default();
        return ptr::null_mut();
    }

    let mut obj = Box::new(FakeObject {
        ctx: raw_ctx,
        class,
        c_name: CString::new(name.clone()).unwrap_or_default(),
        name,
        values: HashMap::new(),
        set_order: Vec::new(),
        editing: begin_edit != 0,
        recalcs: 0,
        last_changes: 0,
        last_flags: 0,
    });
    let ptr = &mut *obj as *mut FakeObject as ObjectPtr;
    ctx.objects.push(obj);
    ptr
}

unsafe extern "C" fn fake_get_handle_by_name(
    ctx: ContextPtr,
    cls_idx: i32,
    name: *const c_char,
) -> ObjectPtr {
    if class_by_index(cls_idx).is_none() {
        fail(ctx as *mut FakeContext, (ERR_INVALID_CLASS, format!("Invalid class index {}", cls_idx)));
        return ptr::null_mut();
    }
    let (Some(ctx), Some(name)) = (context(ctx), read_str(name)) else {
        return ptr::null_mut();
    };
    ctx.objects
        .iter_mut()
        .find(|o| o.class.index == cls_idx && o.name.eq_ignore_ascii_case(name))
        .map_or(ptr::null_mut(), |o| &mut **o as *mut FakeObject as ObjectPtr)
}

unsafe extern "C" fn fake_get_handle_by_idx(ctx: ContextPtr, cls_idx: i32, idx: i32) -> ObjectPtr {
    if class_by_index(cls_idx).is_none() {
        fail(ctx as *mut FakeContext, (ERR_INVALID_CLASS, format!("Invalid class index {}", cls_idx)));
        return ptr::null_mut();
    }
    let Some(ctx) = context(ctx) else {
        return ptr::null_mut();
    };
    if idx < 1 {
        return ptr::null_mut();
    }
    ctx.objects
        .iter_mut()
        .filter(|o| o.class.index == cls_idx)
        .nth(idx as usize - 1)
        .map_or(ptr::null_mut(), |o| &mut **o as *mut FakeObject as ObjectPtr)
}

unsafe extern "C" fn fake_get_count(ctx: ContextPtr, cls_idx: i32) -> i32 {
    if class_by_index(cls_idx).is_none() {
        fail(ctx as *mut FakeContext, (ERR_INVALID_CLASS, format!("Invalid class index {}", cls_idx)));
        return 0;
    }
    context(ctx).map_or(0, |c| {
        c.objects.iter().filter(|o| o.class.index == cls_idx).count() as i32
    })
}

unsafe extern "C" fn fake_get_class_idx(obj: ObjectPtr) -> i32 {
    header(obj).map_or(0, |(_, class)| class.index)
}

unsafe extern "C" fn fake_get_name(obj: ObjectPtr) -> *const c_char {
    (obj as *const FakeObject)
        .as_ref()
        .map_or(ptr::null(), |o| o.c_name.as_ptr())
}

unsafe extern "C" fn fake_begin_edit(obj: ObjectPtr) {
    let Some(o) = (obj as *mut FakeObject).as_mut() else {
        return;
    };
    if o.editing {
        let fault = (ERR_EDIT_STATE, format!("{}.{} is already being edited", o.class.name, o.name));
        fail(o.ctx, fault);
        return;
    }
    o.editing = true;
}

unsafe extern "C" fn fake_end_edit(obj: ObjectPtr, num_changes: i32) {
    let Some(o) = (obj as *mut FakeObject).as_mut() else {
        return;
    };
    if !o.editing {
        let fault = (ERR_EDIT_STATE, format!("{}.{} is not being edited", o.class.name, o.name));
        fail(o.ctx, fault);
        return;
    }
    o.editing = false;
    o.recalcs += 1;
    o.last_changes = num_changes;
}

unsafe extern "C" fn fake_get_int32(obj: ObjectPtr, idx: i32) -> i32 {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return 0;
    };
    settle(ctx, as_i32(prop, &value), 0)
}

unsafe extern "C" fn fake_set_int32(obj: ObjectPtr, idx: i32, value: i32, flags: u32) {
    write(obj, idx, flags, |_, prop| from_i32(prop, value));
}

unsafe extern "C" fn fake_get_float64(obj: ObjectPtr, idx: i32) -> f64 {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return 0.0;
    };
    settle(ctx, as_f64(prop, &value), 0.0)
}

unsafe extern "C" fn fake_set_float64(obj: ObjectPtr, idx: i32, value: f64, flags: u32) {
    write(obj, idx, flags, |_, prop| from_f64(prop, value));
}

unsafe extern "C" fn fake_get_string(obj: ObjectPtr, idx: i32) -> *mut c_char {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return ptr::null_mut();
    };
    alloc_string(ctx_id_of(ctx), &to_text(prop, &value))
}

unsafe extern "C" fn fake_set_string(obj: ObjectPtr, idx: i32, value: *const c_char, flags: u32) {
    write(obj, idx, flags, |ctx, prop| {
        let text = read_str(value).ok_or((ERR_INVALID_VALUE, "Invalid string".to_string()))?;
        from_str(ctx, prop, text)
    });
}

unsafe extern "C" fn fake_get_int32_array(
    result: *mut *mut i32,
    count: *mut i32,
    obj: ObjectPtr,
    idx: i32,
) {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return;
    };
    let values = match value {
        FakeValue::IntArray(v) => Ok(v),
        FakeValue::FloatArray(v) => Ok(v.iter().map(|f| *f as i32).collect()),
        _ => Err(type_fault(prop, "integer array reads")),
    };
    let values = settle(ctx, values, Vec::new());
    alloc_array(ctx_id_of(ctx), values, result, count);
}

unsafe extern "C" fn fake_set_int32_array(
    obj: ObjectPtr,
    idx: i32,
    values: *const i32,
    count: i32,
    flags: u32,
) {
    write(obj, idx, flags, |_, prop| {
        let values = host_slice(values, count)?;
        match prop.kind {
            Kind::IntArray => Ok(FakeValue::IntArray(values.to_vec())),
            Kind::FloatArray => Ok(FakeValue::FloatArray(values.iter().map(|v| *v as f64).collect())),
            _ => Err(type_fault(prop, "integer arrays")),
        }
    });
}

unsafe extern "C" fn fake_get_float64_array(
    result: *mut *mut f64,
    count: *mut i32,
    obj: ObjectPtr,
    idx: i32,
) {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return;
    };
    let values = match value {
        FakeValue::FloatArray(v) => Ok(v),
        FakeValue::IntArray(v) => Ok(v.iter().map(|i| *i as f64).collect()),
        _ => Err(type_fault(prop, "float arrays reads")),
    };
    let values = settle(ctx, values, Vec::new());
    alloc_array(ctx_id_of(ctx), values, result, count);
}

unsafe extern "C" fn fake_set_float64_array(
    obj: ObjectPtr,
    idx: i32,
    values: *const f64,
    count: i32,
    flags: u32,
) {
    write(obj, idx, flags, |_, prop| {
        let values = host_slice(values, count)?;
        match prop.kind {
            Kind::FloatArray => Ok(FakeValue::FloatArray(values.to_vec())),
            Kind::IntArray => Ok(FakeValue::IntArray(values.iter().map(|v| *v as i32).collect())),
            _ => Err(type_fault(prop, "float arrays")),
        }
    });
}

unsafe extern "C" fn fake_get_string_array(
    result: *mut *mut *mut c_char,
    count: *mut i32,
    obj: ObjectPtr,
    idx: i32,
) {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return;
    };
    let strings = match value {
        FakeValue::TextArray(v) => Ok(v),
        FakeValue::ObjectArray(v) => Ok(v.iter().map(|p| ref_name(*p, false)).collect()),
        FakeValue::IntArray(v) => Ok(v.iter().map(|i| i.to_string()).collect()),
        FakeValue::FloatArray(v) => Ok(v.iter().map(|f| f.to_string()).collect()),
        _ => Err(type_fault(prop, "string array reads")),
    };
    let strings: Vec<String> = settle(ctx, strings, Vec::new());
    // Elements are owned by the array and released with it
    let raw: Vec<*mut c_char> = strings
        .iter()
        .map(|s| CString::new(s.replace('\0', "")).unwrap_or_default().into_raw())
        .collect();
    alloc_array(ctx_id_of(ctx), raw, result, count);
}

unsafe extern "C" fn fake_set_string_array(
    obj: ObjectPtr,
    idx: i32,
    values: *const *const c_char,
    count: i32,
    flags: u32,
) {
    write(obj, idx, flags, |ctx, prop| {
        let items = host_slice(values, count)?
            .iter()
            .map(|&p| read_str(p).ok_or((ERR_INVALID_VALUE, "Invalid string".to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        match prop.kind {
            Kind::TextArray => Ok(FakeValue::TextArray(items.iter().map(|s| s.to_string()).collect())),
            Kind::ObjectArray => items
                .iter()
                .map(|s| resolve(ctx, s))
                .collect::<Result<_, _>>()
                .map(FakeValue::ObjectArray),
            Kind::IntArray => items
                .iter()
                .map(|s| parse_i32(prop, s))
                .collect::<Result<_, _>>()
                .map(FakeValue::IntArray),
            Kind::FloatArray => items
                .iter()
                .map(|s| parse_f64(prop, s))
                .collect::<Result<_, _>>()
                .map(FakeValue::FloatArray),
            _ => Err(type_fault(prop, "string arrays")),
        }
    });
}

unsafe extern "C" fn fake_get_object(obj: ObjectPtr, idx: i32) -> ObjectPtr {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return ptr::null_mut();
    };
    let other = match value {
        FakeValue::Object(p) => Ok(p),
        _ => Err(type_fault(prop, "object reads")),
    };
    settle(ctx, other, ptr::null_mut())
}

unsafe extern "C" fn fake_set_object(obj: ObjectPtr, idx: i32, other: ObjectPtr, flags: u32) {
    write(obj, idx, flags, |ctx, prop| {
        if prop.kind != Kind::Object {
            return Err(type_fault(prop, "object references"));
        }
        if !belongs_to(ctx, other) {
            return Err((ERR_FOREIGN_OBJECT, "Object belongs to another context".into()));
        }
        Ok(FakeValue::Object(other))
    });
}

unsafe extern "C" fn fake_get_object_array(
    result: *mut *mut ObjectPtr,
    count: *mut i32,
    obj: ObjectPtr,
    idx: i32,
) {
    let Some((ctx, prop, value)) = read(obj, idx) else {
        return;
    };
    let values = match value {
        FakeValue::ObjectArray(v) => Ok(v),
        _ => Err(type_fault(prop, "object array reads")),
    };
    let values = settle(ctx, values, Vec::new());
    alloc_array(ctx_id_of(ctx), values, result, count);
}

unsafe extern "C" fn fake_set_object_array(
    obj: ObjectPtr,
    idx: i32,
    values: *const ObjectPtr,
    count: i32,
    flags: u32,
) {
    write(obj, idx, flags, |ctx, prop| {
        if prop.kind != Kind::ObjectArray {
            return Err(type_fault(prop, "object arrays"));
        }
        let values = host_slice(values, count)?;
        if values.iter().any(|&p| p.is_null() || !belongs_to(ctx, p)) {
            return Err((ERR_FOREIGN_OBJECT, "Object array holds a foreign or null object".into()));
        }
        Ok(FakeValue::ObjectArray(values.to_vec()))
    });
}

unsafe extern "C" fn fake_to_json(obj: ObjectPtr, options: i32) -> *mut c_char {
    let Some(o) = (obj as *const FakeObject).as_ref() else {
        return ptr::null_mut();
    };
    let options = options as u32;
    let text = render(&object_json(o, options), options);
    alloc_string(ctx_id_of(o.ctx), &text)
}

unsafe extern "C" fn fake_batch_to_json(objs: *const ObjectPtr, count: i32, options: i32) -> *mut c_char {
    let Ok(objs) = host_slice(objs, count) else {
        return ptr::null_mut();
    };
    let options = options as u32;
    let mut ctx_id = 0;
    let mut items = Vec::with_capacity(objs.len());
    for &obj in objs {
        let Some(o) = (obj as *const FakeObject).as_ref() else {
            continue;
        };
        ctx_id = ctx_id_of(o.ctx);
        if options & json_bits::EXCLUDE_DISABLED != 0 && !o.is_enabled() {
            continue;
        }
        items.push(object_json(o, options));
    }
    alloc_string(ctx_id, &render(&Value::Array(items), options))
}

unsafe extern "C" fn fake_dispose_string(value: *mut c_char) {
    if !value.is_null() && untrack(value as usize) {
        drop(CString::from_raw(value));
    }
}

unsafe extern "C" fn fake_dispose_int32_array(values: *mut i32, count: i32) {
    drop(release_array(values, count));
}

unsafe extern "C" fn fake_dispose_float64_array(values: *mut f64, count: i32) {
    drop(release_array(values, count));
}

unsafe extern "C" fn fake_dispose_string_array(values: *mut *mut c_char, count: i32) {
    if let Some(items) = release_array(values, count) {
        for &item in items.iter() {
            if !item.is_null() {
                drop(CString::from_raw(item));
            }
        }
    }
}

unsafe extern "C" fn fake_dispose_pointer_array(values: *mut ObjectPtr, count: i32) {
    drop(release_array(values, count));
}

// ----------------------------------------------------------------------
// Public surface
// ----------------------------------------------------------------------

/// The fake engine's complete function table
pub fn function_table() -> DssFunctionTable {
    DssFunctionTable {
        version: FUNCTION_TABLE_VERSION,
        ctx_new: Some(fake_ctx_new),
        ctx_dispose: Some(fake_ctx_dispose),
        clear_all: Some(fake_clear_all),
        error_get_number: Some(fake_error_get_number),
        error_get_description: Some(fake_error_get_description),
        error_clear: Some(fake_error_clear),
        new_object: Some(fake_new_object),
        get_handle_by_name: Some(fake_get_handle_by_name),
        get_handle_by_idx: Some(fake_get_handle_by_idx),
        get_count: Some(fake_get_count),
        get_class_idx: Some(fake_get_class_idx),
        get_name: Some(fake_get_name),
        begin_edit: Some(fake_begin_edit),
        end_edit: Some(fake_end_edit),
        get_int32: Some(fake_get_int32),
        set_int32: Some(fake_set_int32),
        get_float64: Some(fake_get_float64),
        set_float64: Some(fake_set_float64),
        get_string: Some(fake_get_string),
        set_string: Some(fake_set_string),
        get_int32_array: Some(fake_get_int32_array),
        set_int32_array: Some(fake_set_int32_array),
        get_float64_array: Some(fake_get_float64_array),
        set_float64_array: Some(fake_set_float64_array),
        get_string_array: Some(fake_get_string_array),
        set_string_array: Some(fake_set_string_array),
        get_object: Some(fake_get_object),
        set_object: Some(fake_set_object),
        get_object_array: Some(fake_get_object_array),
        set_object_array: Some(fake_set_object_array),
        to_json: Some(fake_to_json),
        batch_to_json: Some(fake_batch_to_json),
        dispose_string: Some(fake_dispose_string),
        dispose_int32_array: Some(fake_dispose_int32_array),
        dispose_float64_array: Some(fake_dispose_float64_array),
        dispose_string_array: Some(fake_dispose_string_array),
        dispose_pointer_array: Some(fake_dispose_pointer_array),
    }
}

/// Install the fake engine as the process-wide function table
///
/// Safe to call from every test; the first call wins.
///
/// # Panics
/// Panics if the fake table fails validation
pub fn install() -> &'static EngineApi {
    get_or_init_api(|| {
        let table = function_table();
        // SAFETY: `table` is a fully populated local table
        unsafe { load_function_table(&table) }.expect("fake function table is complete")
    })
}

/// Buffers handed out for `ctx` and not yet disposed
///
/// # Safety
/// `ctx` must be a live fake context
pub unsafe fn outstanding_buffers(ctx: ContextPtr) -> usize {
    let Some(id) = context(ctx).map(|c| c.id) else {
        return 0;
    };
    buffers().lock().values().filter(|&&owner| owner == id).count()
}

/// Dispose calls that named a pointer the engine never handed out
/// (or had already been released)
pub fn invalid_disposals() -> usize {
    INVALID_DISPOSALS.load(Ordering::SeqCst)
}

/// Completed edit sessions (recalculations) of an object
///
/// # Safety
/// `obj` must be a live fake object
pub unsafe fn recalc_count(obj: ObjectPtr) -> u32 {
    (obj as *const FakeObject).as_ref().map_or(0, |o| o.recalcs)
}

/// Change count passed to the object's last `end_edit`
///
/// # Safety
/// `obj` must be a live fake object
pub unsafe fn last_change_count(obj: ObjectPtr) -> i32 {
    (obj as *const FakeObject).as_ref().map_or(0, |o| o.last_changes)
}

/// Flags word of the object's last successful write
///
/// # Safety
/// `obj` must be a live fake object
pub unsafe fn last_setter_flags(obj: ObjectPtr) -> u32 {
    (obj as *const FakeObject).as_ref().map_or(0, |o| o.last_flags)
}

/// Whether the engine considers the object inside an edit session
///
/// # Safety
/// `obj` must be a live fake object
pub unsafe fn is_editing(obj: ObjectPtr) -> bool {
    (obj as *const FakeObject).as_ref().is_some_and(|o| o.editing)
}
