//! Variable catalog
//!
//! A quest progress-state type declares the members a formula may reference
//! through [`ProgressState::declare`]. The declaration is turned once into a
//! [`VariableCatalog`]: an ordered list of [`VariableBinding`]s, each knowing
//! how to read its member off a state instance and reduce it to an `f64`.
//!
//! # Reduction ladder
//!
//! The output kind of a member is decided by its type, first match wins:
//!
//! 1. [`SingleValue`] containers are reduced, then widened ([`OutputKind::Reducer`])
//! 2. `f64` is read as is ([`OutputKind::Direct`])
//! 3. other numeric primitives are cast ([`OutputKind::NumericConversion`])
//! 4. `bool` and `String` are converted ([`OutputKind::GenericConversion`])
//!
//! Members of any other type can still be declared with
//! [`MemberTable::opaque`]; they are [`OutputKind::NotNumeric`] and only fail
//! once a formula references them.
//!
//! # Inheritance
//!
//! State types compose instead of inheriting: [`MemberTable::base`] splices the
//! members of an embedded state one lineage level deeper. Catalog order is
//! most-derived first, then declaration order.

use dashmap::DashMap;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reads a member off a state instance, already reduced to `f64`
pub type Reader<S> = Arc<dyn Fn(&S) -> f64 + Send + Sync>;

/// Quest progress-state type usable in reward formulas
pub trait ProgressState: Sized + Send + Sync + 'static {
    /// Declare the members formulas may reference
    fn declare(members: &mut MemberTable<Self>);
}

/// Numeric primitive a [`SingleValue`] container reduces to
pub trait Widen: Copy {
    fn widen(self) -> f64;
}

macro_rules! impl_widen {
    ($($t:ty),*) => {
        $(
            impl Widen for $t {
                #[inline]
                fn widen(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_widen!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Container that represents one quantity, possibly still resolving
pub trait SingleValue {
    type Output: Widen;

    fn single_value(&self) -> Self::Output;
}

/// How a member value becomes an `f64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Invoke the single-value reducer, then widen
    Reducer,
    /// Already `f64`
    Direct,
    /// Numeric cast to `f64`
    NumericConversion,
    /// Lossy generic conversion (`bool`, numeric text)
    GenericConversion,
    /// Cannot be reduced to a number
    NotNumeric,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Reducer => "reducer",
            OutputKind::Direct => "direct",
            OutputKind::NumericConversion => "numeric conversion",
            OutputKind::GenericConversion => "generic conversion",
            OutputKind::NotNumeric => "not numeric",
        };
        f.write_str(name)
    }
}

/// Member type a formula can read
///
/// Reduction never panics; values without a numeric meaning become NaN.
pub trait FormulaValue: 'static {
    fn output_kind() -> OutputKind;

    fn to_formula_f64(&self) -> f64;
}

impl<T: SingleValue + 'static> FormulaValue for T {
    fn output_kind() -> OutputKind {
        OutputKind::Reducer
    }

    #[inline]
    fn to_formula_f64(&self) -> f64 {
        self.single_value().widen()
    }
}

impl FormulaValue for f64 {
    fn output_kind() -> OutputKind {
        OutputKind::Direct
    }

    #[inline]
    fn to_formula_f64(&self) -> f64 {
        *self
    }
}

macro_rules! impl_numeric_formula_value {
    ($($t:ty),*) => {
        $(
            impl FormulaValue for $t {
                fn output_kind() -> OutputKind {
                    OutputKind::NumericConversion
                }

                #[inline]
                fn to_formula_f64(&self) -> f64 {
                    *self as f64
                }
            }
        )*
    };
}

impl_numeric_formula_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32);

impl FormulaValue for bool {
    fn output_kind() -> OutputKind {
        OutputKind::GenericConversion
    }

    fn to_formula_f64(&self) -> f64 {
        if *self {
            1.0
        } else {
            0.0
        }
    }
}

impl FormulaValue for String {
    fn output_kind() -> OutputKind {
        OutputKind::GenericConversion
    }

    fn to_formula_f64(&self) -> f64 {
        self.trim().parse().unwrap_or(f64::NAN)
    }
}

/// Type that declares members
#[derive(Debug, Clone, Copy)]
pub struct DeclaringType {
    pub id: TypeId,
    pub name: &'static str,
}

impl DeclaringType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

impl PartialEq for DeclaringType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeclaringType {}

/// One declared member, before the catalog is built
pub struct MemberDecl<S> {
    name: &'static str,
    alias: Option<&'static str>,
    excluded: bool,
    type_name: &'static str,
    kind: OutputKind,
    lineage: Vec<DeclaringType>,
    reader: Option<Reader<S>>,
}

impl<S> MemberDecl<S> {
    /// Additional name the member answers to
    pub fn alias(&mut self, alias: &'static str) -> &mut Self {
        self.alias = Some(alias);
        self
    }

    /// Hide the member from formulas
    pub fn exclude(&mut self) -> &mut Self {
        self.excluded = true;
        self
    }
}

/// Member declarations of one state type
pub struct MemberTable<S> {
    owner: DeclaringType,
    members: Vec<MemberDecl<S>>,
}

impl<S: ProgressState> MemberTable<S> {
    fn new() -> Self {
        Self {
            owner: DeclaringType::of::<S>(),
            members: Vec::new(),
        }
    }

    /// Declare a stored member
    pub fn field<T: FormulaValue>(
        &mut self,
        name: &'static str,
        accessor: fn(&S) -> &T,
    ) -> &mut MemberDecl<S> {
        let reader: Reader<S> = Arc::new(move |state: &S| accessor(state).to_formula_f64());
        self.push::<T>(name, T::output_kind(), Some(reader))
    }

    /// Declare a computed member
    pub fn property<T: FormulaValue>(
        &mut self,
        name: &'static str,
        getter: fn(&S) -> T,
    ) -> &mut MemberDecl<S> {
        let reader: Reader<S> = Arc::new(move |state: &S| getter(state).to_formula_f64());
        self.push::<T>(name, T::output_kind(), Some(reader))
    }

    /// Declare a member whose type has no numeric meaning
    pub fn opaque<T: 'static>(&mut self, name: &'static str) -> &mut MemberDecl<S> {
        self.push::<T>(name, OutputKind::NotNumeric, None)
    }

    /// Splice in the members of an embedded base state
    pub fn base<B: ProgressState>(&mut self, accessor: fn(&S) -> &B) -> &mut Self {
        let mut inner = MemberTable::<B>::new();
        B::declare(&mut inner);

        for decl in inner.members {
            let reader = decl.reader.map(|read| -> Reader<S> {
                Arc::new(move |state: &S| read(accessor(state)))
            });

            let mut lineage = Vec::with_capacity(decl.lineage.len() + 1);
            lineage.push(self.owner);
            lineage.extend(decl.lineage);

            self.members.push(MemberDecl {
                name: decl.name,
                alias: decl.alias,
                excluded: decl.excluded,
                type_name: decl.type_name,
                kind: decl.kind,
                lineage,
                reader,
            });
        }

        self
    }

    fn push<T: 'static>(
        &mut self,
        name: &'static str,
        kind: OutputKind,
        reader: Option<Reader<S>>,
    ) -> &mut MemberDecl<S> {
        self.members.push(MemberDecl {
            name,
            alias: None,
            excluded: false,
            type_name: type_name::<T>(),
            kind,
            lineage: vec![self.owner],
            reader,
        });
        let last = self.members.len() - 1;
        &mut self.members[last]
    }
}

/// A formula-visible member of a state type
pub struct VariableBinding<S> {
    name: &'static str,
    alias: Option<&'static str>,
    type_name: &'static str,
    kind: OutputKind,
    /// Most-derived type first, declaring type last
    lineage: Vec<DeclaringType>,
    reader: Option<Reader<S>>,
}

impl<S> VariableBinding<S> {
    /// Member name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn alias(&self) -> Option<&'static str> {
        self.alias
    }

    /// Every name the binding answers to
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        let alias = self.alias.filter(|alias| *alias != self.name);
        std::iter::once(self.name).chain(alias)
    }

    /// Declared type of the member
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn output_kind(&self) -> OutputKind {
        self.kind
    }

    /// Type that declares the member
    pub fn declaring_type(&self) -> &DeclaringType {
        // Lineage always holds at least the declaring type.
        &self.lineage[self.lineage.len() - 1]
    }

    /// Inheritance distance from the catalog's state type
    pub fn depth(&self) -> usize {
        self.lineage.len() - 1
    }

    /// Whether this member's declaring type derives from the other's
    pub fn is_more_derived_than(&self, other: &VariableBinding<S>) -> bool {
        self.lineage.len() < other.lineage.len() && other.lineage.starts_with(&self.lineage)
    }

    /// Member reader, `None` for non-numeric members
    pub fn reader(&self) -> Option<&Reader<S>> {
        self.reader.as_ref()
    }

    /// Read and reduce the member
    pub fn read(&self, state: &S) -> Option<f64> {
        self.reader.as_ref().map(|read| read(state))
    }

    /// `Type::member` description for diagnostics
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.declaring_type().name, self.name)
    }
}

impl<S> fmt::Debug for VariableBinding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableBinding")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("declared_by", &self.declaring_type().name)
            .finish()
    }
}

/// Ordered formula-visible members of one state type
pub struct VariableCatalog<S> {
    state_type: &'static str,
    bindings: Vec<Arc<VariableBinding<S>>>,
    index: HashMap<&'static str, Vec<usize>>,
}

impl<S: ProgressState> VariableCatalog<S> {
    /// Build the catalog from the state's member declaration
    pub fn build() -> Self {
        let mut table = MemberTable::<S>::new();
        S::declare(&mut table);

        let mut decls: Vec<MemberDecl<S>> = table
            .members
            .into_iter()
            .filter(|decl| !decl.excluded)
            .collect();
        // Stable: declaration order is kept within each depth.
        decls.sort_by_key(|decl| decl.lineage.len());

        let bindings: Vec<Arc<VariableBinding<S>>> = decls
            .into_iter()
            .map(|decl| {
                Arc::new(VariableBinding {
                    name: decl.name,
                    alias: decl.alias,
                    type_name: decl.type_name,
                    kind: decl.kind,
                    lineage: decl.lineage,
                    reader: decl.reader,
                })
            })
            .collect();

        let mut index: HashMap<&'static str, Vec<usize>> = HashMap::new();
        for (slot, binding) in bindings.iter().enumerate() {
            for name in binding.names() {
                index.entry(name).or_default().push(slot);
            }
        }

        tracing::debug!(
            "Built variable catalog for {} ({} bindings, {} names)",
            type_name::<S>(),
            bindings.len(),
            index.len()
        );

        Self {
            state_type: type_name::<S>(),
            bindings,
            index,
        }
    }
}

impl<S> VariableCatalog<S> {
    pub fn state_type(&self) -> &'static str {
        self.state_type
    }

    /// Bindings in catalog order
    pub fn bindings(&self) -> &[Arc<VariableBinding<S>>] {
        &self.bindings
    }

    /// Every registered name, in catalog order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bindings.iter().flat_map(|binding| binding.names())
    }

    /// Bindings answering to `name`, in catalog order
    pub fn candidates(&self, name: &str) -> Vec<&Arc<VariableBinding<S>>> {
        self.index
            .get(name)
            .map(|slots| slots.iter().map(|&slot| &self.bindings[slot]).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Catalogs memoized per state type
#[derive(Default)]
pub struct CatalogCache {
    catalogs: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of `S`, built on first use
    pub fn get<S: ProgressState>(&self) -> Arc<VariableCatalog<S>> {
        let erased = self
            .catalogs
            .entry(TypeId::of::<S>())
            .or_insert_with(|| Arc::new(VariableCatalog::<S>::build()) as Arc<dyn Any + Send + Sync>)
            .clone();

        // Keyed by TypeId, so the downcast cannot miss.
        erased
            .downcast::<VariableCatalog<S>>()
            .unwrap_or_else(|_| Arc::new(VariableCatalog::<S>::build()))
    }

    /// Number of state types catalogued so far
    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Rolled quantity that reduces to a single value
    pub struct Rolled {
        pub value: u8,
    }

    impl SingleValue for Rolled {
        type Output = u8;

        fn single_value(&self) -> u8 {
            self.value
        }
    }

    pub struct BaseState {
        pub completed: u32,
        pub kills: i32,
        pub region: String,
    }

    impl ProgressState for BaseState {
        fn declare(members: &mut MemberTable<Self>) {
            members.field("completed", |s| &s.completed);
            members.field("kills", |s| &s.kills);
            members.opaque::<Vec<u32>>("visited");
            members.field("region", |s| &s.region);
        }
    }

    pub struct HuntState {
        pub base: BaseState,
        pub kills: u16,
        pub distance: f64,
        pub bonus: Rolled,
        pub elite: bool,
        pub secret: i64,
    }

    impl ProgressState for HuntState {
        fn declare(members: &mut MemberTable<Self>) {
            members.base(|s| &s.base);
            members.field("kills", |s| &s.kills).alias("k");
            members.field("distance", |s| &s.distance).alias("dist");
            members.field("bonus", |s| &s.bonus);
            members.field("elite", |s| &s.elite);
            members.field("secret", |s| &s.secret).exclude();
            members.property("double_kills", |s| u32::from(s.kills) * 2);
        }
    }

    pub fn hunt_state() -> HuntState {
        HuntState {
            base: BaseState {
                completed: 3,
                kills: 100,
                region: " 12.5 ".into(),
            },
            kills: 4,
            distance: 250.5,
            bonus: Rolled { value: 7 },
            elite: true,
            secret: 99,
        }
    }

    #[test]
    fn test_catalog_order_is_derived_first() {
        let catalog = VariableCatalog::<HuntState>::build();
        let names: Vec<_> = catalog.bindings().iter().map(|b| b.name()).collect();
        assert_eq!(
            names,
            vec!["kills", "distance", "bonus", "elite", "double_kills", "completed", "kills", "visited", "region"]
        );
        assert_eq!(catalog.bindings()[0].depth(), 0);
        assert_eq!(catalog.bindings()[5].depth(), 1);
    }

    #[test]
    fn test_excluded_member_is_absent() {
        let catalog = VariableCatalog::<HuntState>::build();
        assert!(catalog.candidates("secret").is_empty());
        assert!(catalog.names().all(|name| name != "secret"));
    }

    #[test]
    fn test_every_name_maps_back_to_its_binding() {
        let catalog = VariableCatalog::<HuntState>::build();
        for binding in catalog.bindings() {
            for name in binding.names() {
                let candidates = catalog.candidates(name);
                assert!(
                    candidates.iter().any(|c| Arc::ptr_eq(c, binding)),
                    "{} does not map back to {:?}",
                    name,
                    binding
                );
            }
        }
        assert_eq!(catalog.candidates("k")[0].name(), "kills");
        assert_eq!(catalog.candidates("dist")[0].name(), "distance");
    }

    #[test]
    fn test_output_kinds_follow_member_types() {
        let catalog = VariableCatalog::<HuntState>::build();
        let kind = |name: &str| catalog.candidates(name)[0].output_kind();

        assert_eq!(kind("bonus"), OutputKind::Reducer);
        assert_eq!(kind("distance"), OutputKind::Direct);
        assert_eq!(kind("k"), OutputKind::NumericConversion);
        assert_eq!(kind("elite"), OutputKind::GenericConversion);
        assert_eq!(kind("region"), OutputKind::GenericConversion);
        assert_eq!(kind("visited"), OutputKind::NotNumeric);
    }

    #[test]
    fn test_readers_reduce_members() {
        let catalog = VariableCatalog::<HuntState>::build();
        let state = hunt_state();
        let read = |name: &str| catalog.candidates(name)[0].read(&state);

        assert_eq!(read("kills"), Some(4.0));
        assert_eq!(read("completed"), Some(3.0));
        assert_eq!(read("distance"), Some(250.5));
        assert_eq!(read("bonus"), Some(7.0));
        assert_eq!(read("elite"), Some(1.0));
        assert_eq!(read("region"), Some(12.5));
        assert_eq!(read("double_kills"), Some(8.0));
        assert_eq!(read("visited"), None);
    }

    #[test]
    fn test_generic_conversion_is_total() {
        assert!(String::from("lots").to_formula_f64().is_nan());
        assert_eq!(false.to_formula_f64(), 0.0);
        assert_eq!(u64::MAX.to_formula_f64(), u64::MAX as f64);
    }

    #[test]
    fn test_lineage_ordering() {
        let catalog = VariableCatalog::<HuntState>::build();
        let kills = catalog.candidates("kills");
        assert_eq!(kills.len(), 2);
        assert!(kills[0].is_more_derived_than(kills[1]));
        assert!(!kills[1].is_more_derived_than(kills[0]));
        assert_eq!(kills[1].declaring_type().name, type_name::<BaseState>());
        assert!(kills[1].qualified_name().ends_with("BaseState::kills"));
    }

    #[test]
    fn test_catalog_cache_builds_once() {
        let cache = CatalogCache::new();
        let first = cache.get::<HuntState>();
        let second = cache.get::<HuntState>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.get::<BaseState>();
        assert_eq!(cache.len(), 2);
    }
}
