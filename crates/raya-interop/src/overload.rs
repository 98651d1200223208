//! Overload selection
//!
//! Picks the single most specific applicable candidate for a concrete
//! argument list. A candidate is applicable in its normal form (one argument
//! per parameter, omitted trailing parameters optional) or, when it ends in
//! a variadic parameter, in its expanded form (trailing arguments matched
//! against the element type).
//!
//! Candidate A beats B when no argument converts worse to A's parameter and
//! at least one converts better. Per argument, a lower [`ConversionRank`]
//! wins; equal ranks prefer the parameter type that converts to the other.
//! When every argument ties:
//!
//! 1. normal form beats expanded form
//! 2. fewer omitted optional parameters wins
//! 3. a member declared on a more derived type wins
//!
//! The result depends only on the candidate set, never on its order.

use std::cmp::Ordering;
use std::sync::Arc;

use raya_interop_sdk::{TypeHandle, Value};

use crate::conversion::{classify, widens, ConversionRank};
use crate::types::{MemberDescriptor, TypeRegistry};

/// Outcome of overload selection
#[derive(Debug, Clone)]
pub enum Selection {
    /// Single best candidate
    Found(Arc<MemberDescriptor>),
    /// No candidate accepts the arguments
    NoMatch,
    /// Several candidates are equally good
    Ambiguous,
}

impl Selection {
    /// Selected member, if any
    pub fn found(self) -> Option<Arc<MemberDescriptor>> {
        match self {
            Selection::Found(member) => Some(member),
            _ => None,
        }
    }
}

struct Applicable<'m> {
    member: &'m Arc<MemberDescriptor>,
    ranks: Vec<ConversionRank>,
    param_types: Vec<TypeHandle>,
    expanded: bool,
    omitted: usize,
}

/// Overload selector over a registry
pub struct OverloadSelector<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> OverloadSelector<'a> {
    /// Create a selector
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Select the best candidate for `args`
    pub fn select(&self, candidates: &[Arc<MemberDescriptor>], args: &[Value]) -> Selection {
        let applicable: Vec<Applicable<'_>> = candidates
            .iter()
            .filter_map(|member| self.applicability(member, args))
            .collect();

        match applicable.len() {
            0 => return Selection::NoMatch,
            1 => return Selection::Found(applicable[0].member.clone()),
            _ => {}
        }

        let mut winners = applicable.iter().filter(|a| {
            applicable
                .iter()
                .filter(|b| !Arc::ptr_eq(a.member, b.member))
                .all(|b| self.is_better(a, b))
        });
        match (winners.next(), winners.next()) {
            (Some(best), None) => Selection::Found(best.member.clone()),
            _ => Selection::Ambiguous,
        }
    }

    /// Check if a candidate accepts `args` in either form
    pub fn is_applicable(&self, member: &MemberDescriptor, args: &[Value]) -> bool {
        self.normal_form(member, args).is_some() || self.expanded_form(member, args).is_some()
    }

    fn applicability<'m>(&self, member: &'m Arc<MemberDescriptor>, args: &[Value]) -> Option<Applicable<'m>> {
        let (ranks, param_types, expanded) = match self.normal_form(member, args) {
            Some((ranks, types)) => (ranks, types, false),
            None => {
                let (ranks, types) = self.expanded_form(member, args)?;
                (ranks, types, true)
            }
        };
        let supplied = if expanded {
            args.len().min(member.parameters.len() - 1)
        } else {
            args.len()
        };
        let declared = member.parameters.len() - usize::from(expanded);
        Some(Applicable {
            member,
            ranks,
            param_types,
            expanded,
            omitted: declared.saturating_sub(supplied),
        })
    }

    fn normal_form(&self, member: &MemberDescriptor, args: &[Value]) -> Option<(Vec<ConversionRank>, Vec<TypeHandle>)> {
        let params = &member.parameters;
        if args.len() > params.len() || !params[args.len()..].iter().all(|p| p.is_optional) {
            return None;
        }
        let mut ranks = Vec::with_capacity(args.len());
        let mut types = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(params) {
            ranks.push(classify(self.registry, arg, param.ty)?);
            types.push(param.ty);
        }
        Some((ranks, types))
    }

    fn expanded_form(&self, member: &MemberDescriptor, args: &[Value]) -> Option<(Vec<ConversionRank>, Vec<TypeHandle>)> {
        if !member.is_variadic() {
            return None;
        }
        let params = &member.parameters;
        let fixed = params.len() - 1;
        let element = self.registry.get(params[fixed].ty)?.element_type()?;

        if args.len() < fixed && !params[args.len()..fixed].iter().all(|p| p.is_optional) {
            return None;
        }

        let mut ranks = Vec::with_capacity(args.len());
        let mut types = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let ty = if index < fixed { params[index].ty } else { element };
            ranks.push(classify(self.registry, arg, ty)?);
            types.push(ty);
        }
        Some((ranks, types))
    }

    fn is_better(&self, a: &Applicable<'_>, b: &Applicable<'_>) -> bool {
        let mut better_somewhere = false;
        for i in 0..a.ranks.len() {
            match self.compare_conversion(a.ranks[i], a.param_types[i], b.ranks[i], b.param_types[i]) {
                Ordering::Less => better_somewhere = true,
                Ordering::Greater => return false,
                Ordering::Equal => {}
            }
        }
        if better_somewhere {
            return true;
        }

        if a.expanded != b.expanded {
            return !a.expanded;
        }
        if a.omitted != b.omitted {
            return a.omitted < b.omitted;
        }
        let (da, db) = (a.member.declaring_type, b.member.declaring_type);
        da != db && self.registry.is_subclass_of(da, db)
    }

    /// `Less` when the conversion to `ta` is better than to `tb`
    fn compare_conversion(&self, ra: ConversionRank, ta: TypeHandle, rb: ConversionRank, tb: TypeHandle) -> Ordering {
        if ta == tb {
            return Ordering::Equal;
        }
        match ra.cmp(&rb) {
            Ordering::Equal => {}
            other => return other,
        }
        let a_to_b = self.registry.is_assignable(ta, tb) || widens(ta, tb);
        let b_to_a = self.registry.is_assignable(tb, ta) || widens(tb, ta);
        match (a_to_b, b_to_a) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}
