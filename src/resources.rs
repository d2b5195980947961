//! Resource catalog and resource-spec resolution.
//!
//! A spec string like `"*"`, `"ann|ben"`, `"platform|!ann"` is parsed once
//! into a small AST and expanded against the catalog into an ordered,
//! de-duplicated candidate list. Unknown names fail at parse time, before
//! any scheduling work starts.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ScheduleError;
use crate::models::{Resource, ResourceGroup};

/// Shared pseudo-resource that serializes tasks with no assignable resource.
pub const UNASSIGNED_RESOURCE: &str = "unassigned";

/// Parsed resource specification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceSpec {
    /// `*`: every resource, in catalog order.
    All,
    /// A single resource by id.
    Named(String),
    /// A group by name, expanding to its members in declaration order.
    Group(String),
    /// Ordered alternatives, e.g. `a|b|team`.
    Alt(Vec<ResourceSpec>),
    /// An inner spec minus the excluded resource ids (`!x` terms).
    Exclude(Box<ResourceSpec>, Vec<String>),
}

impl ResourceSpec {
    /// Parse a spec string against the catalog. Bare identifiers resolve to
    /// a group if one exists by that name, otherwise to a resource; anything
    /// else is an `UnknownResource` error.
    pub fn parse(input: &str, catalog: &ResourceCatalog) -> Result<Self, ScheduleError> {
        let mut includes: Vec<ResourceSpec> = Vec::new();
        let mut excludes: Vec<String> = Vec::new();

        for part in input.split('|').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(excluded) = part.strip_prefix('!') {
                let excluded = excluded.trim();
                if !catalog.has_resource(excluded) {
                    return Err(ScheduleError::UnknownResource(excluded.to_string()));
                }
                excludes.push(excluded.to_string());
            } else if part == "*" {
                includes.push(ResourceSpec::All);
            } else if catalog.has_group(part) {
                includes.push(ResourceSpec::Group(part.to_string()));
            } else if catalog.has_resource(part) {
                includes.push(ResourceSpec::Named(part.to_string()));
            } else {
                return Err(ScheduleError::UnknownResource(part.to_string()));
            }
        }

        let base = match includes.len() {
            // Pure exclusions filter the whole pool: "!ann" == "*|!ann".
            0 => ResourceSpec::All,
            1 => includes.pop().expect("len checked"),
            _ => ResourceSpec::Alt(includes),
        };

        if excludes.is_empty() {
            Ok(base)
        } else {
            Ok(ResourceSpec::Exclude(Box::new(base), excludes))
        }
    }
}

/// Immutable view of the bundle's resources: ordering for deterministic
/// expansion, per-resource DNS merged with the global DNS once, and fully
/// resolved groups.
#[derive(Clone, Debug, Default)]
pub struct ResourceCatalog {
    order: Vec<String>,
    ids: FxHashSet<String>,
    dns: FxHashMap<String, Vec<(NaiveDate, NaiveDate)>>,
    groups: FxHashMap<String, Vec<String>>,
    global_dns: Vec<(NaiveDate, NaiveDate)>,
}

impl ResourceCatalog {
    /// Build a catalog, resolving group members up front. Group members may
    /// be resource ids, `*`, or `!id` exclusions; unknown names are fatal.
    pub fn new(
        resources: &[Resource],
        groups: &[ResourceGroup],
        global_dns: &[(NaiveDate, NaiveDate)],
    ) -> Result<Self, ScheduleError> {
        let order: Vec<String> = resources.iter().map(|r| r.id.clone()).collect();
        let ids: FxHashSet<String> = order.iter().cloned().collect();

        let mut dns: FxHashMap<String, Vec<(NaiveDate, NaiveDate)>> = FxHashMap::default();
        for resource in resources {
            let mut periods: Vec<(NaiveDate, NaiveDate)> = global_dns.to_vec();
            periods.extend(resource.dns_periods.iter().copied());
            dns.insert(resource.id.clone(), periods);
        }

        let mut resolved_groups: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for group in groups {
            let mut members: Vec<String> = Vec::new();
            let mut excluded: Vec<&str> = Vec::new();
            for member in &group.members {
                let member = member.trim();
                if member == "*" {
                    members.extend(order.iter().cloned());
                } else if let Some(name) = member.strip_prefix('!') {
                    if !ids.contains(name) {
                        return Err(ScheduleError::UnknownResource(name.to_string()));
                    }
                    excluded.push(name);
                } else if ids.contains(member) {
                    members.push(member.to_string());
                } else {
                    return Err(ScheduleError::UnknownResource(member.to_string()));
                }
            }
            members.retain(|m| !excluded.contains(&m.as_str()));
            dedup_in_order(&mut members);
            resolved_groups.insert(group.name.clone(), members);
        }

        Ok(Self {
            order,
            ids,
            dns,
            groups: resolved_groups,
            global_dns: global_dns.to_vec(),
        })
    }

    pub fn resource_order(&self) -> &[String] {
        &self.order
    }

    pub fn has_resource(&self, id: &str) -> bool {
        self.ids.contains(id) || id == UNASSIGNED_RESOURCE
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// DNS periods for a resource, global periods included. Resources named
    /// only in explicit task assignments are not in the catalog and get the
    /// global periods alone.
    pub fn dns_for(&self, resource: &str) -> Vec<(NaiveDate, NaiveDate)> {
        self.dns
            .get(resource)
            .cloned()
            .unwrap_or_else(|| self.global_dns.clone())
    }

    /// Expand a parsed spec into an ordered, de-duplicated candidate list.
    /// An empty result means the caller falls back to the unassigned
    /// resource.
    pub fn expand(&self, spec: &ResourceSpec) -> Result<Vec<String>, ScheduleError> {
        let mut out: Vec<String> = Vec::new();
        self.walk(spec, &mut out)?;
        dedup_in_order(&mut out);
        Ok(out)
    }

    fn walk(&self, spec: &ResourceSpec, out: &mut Vec<String>) -> Result<(), ScheduleError> {
        match spec {
            ResourceSpec::All => out.extend(self.order.iter().cloned()),
            ResourceSpec::Named(id) => out.push(id.clone()),
            ResourceSpec::Group(name) => {
                let members = self
                    .groups
                    .get(name)
                    .ok_or_else(|| ScheduleError::UnknownGroup(name.clone()))?;
                out.extend(members.iter().cloned());
            }
            ResourceSpec::Alt(specs) => {
                for inner in specs {
                    self.walk(inner, out)?;
                }
            }
            ResourceSpec::Exclude(inner, excluded) => {
                let mut candidates: Vec<String> = Vec::new();
                self.walk(inner, &mut candidates)?;
                candidates.retain(|c| !excluded.contains(c));
                out.extend(candidates);
            }
        }
        Ok(())
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ResourceCatalog {
        let resources = vec![
            Resource::new("ann"),
            Resource::new("ben"),
            Resource::new("cho"),
        ];
        let groups = vec![ResourceGroup {
            name: "platform".to_string(),
            members: vec!["ben".to_string(), "cho".to_string()],
        }];
        ResourceCatalog::new(&resources, &groups, &[]).unwrap()
    }

    fn expand(spec: &str) -> Vec<String> {
        let catalog = catalog();
        let parsed = ResourceSpec::parse(spec, &catalog).unwrap();
        catalog.expand(&parsed).unwrap()
    }

    #[test]
    fn wildcard_expands_in_catalog_order() {
        assert_eq!(expand("*"), vec!["ann", "ben", "cho"]);
    }

    #[test]
    fn alternatives_preserve_order() {
        assert_eq!(expand("cho|ann"), vec!["cho", "ann"]);
    }

    #[test]
    fn group_expands_to_members() {
        assert_eq!(expand("platform"), vec!["ben", "cho"]);
    }

    #[test]
    fn exclusion_filters() {
        assert_eq!(expand("!ben"), vec!["ann", "cho"]);
        assert_eq!(expand("*|!ann|!cho"), vec!["ben"]);
        assert_eq!(expand("platform|!cho"), vec!["ben"]);
    }

    #[test]
    fn duplicates_are_removed_keeping_first() {
        assert_eq!(expand("ben|platform"), vec!["ben", "cho"]);
    }

    #[test]
    fn unknown_name_is_fatal() {
        let catalog = catalog();
        assert_eq!(
            ResourceSpec::parse("zoe", &catalog),
            Err(ScheduleError::UnknownResource("zoe".to_string()))
        );
        assert_eq!(
            ResourceSpec::parse("*|!zoe", &catalog),
            Err(ScheduleError::UnknownResource("zoe".to_string()))
        );
    }

    #[test]
    fn everything_excluded_yields_empty() {
        assert!(expand("!ann|!ben|!cho").is_empty());
    }

    #[test]
    fn group_members_are_validated() {
        let resources = vec![Resource::new("ann")];
        let groups = vec![ResourceGroup {
            name: "ghost".to_string(),
            members: vec!["nobody".to_string()],
        }];
        assert_eq!(
            ResourceCatalog::new(&resources, &groups, &[]).unwrap_err(),
            ScheduleError::UnknownResource("nobody".to_string())
        );
    }

    #[test]
    fn group_wildcard_and_exclusions() {
        let resources = vec![Resource::new("ann"), Resource::new("ben")];
        let groups = vec![ResourceGroup {
            name: "everyone_but_ann".to_string(),
            members: vec!["*".to_string(), "!ann".to_string()],
        }];
        let catalog = ResourceCatalog::new(&resources, &groups, &[]).unwrap();
        let spec = ResourceSpec::parse("everyone_but_ann", &catalog).unwrap();
        assert_eq!(catalog.expand(&spec).unwrap(), vec!["ben"]);
    }

    #[test]
    fn dns_merges_global_periods() {
        let d = |m: u32, day: u32| NaiveDate::from_ymd_opt(2025, m, day).unwrap();
        let resources = vec![Resource {
            id: "ann".to_string(),
            dns_periods: vec![(d(2, 1), d(2, 5))],
        }];
        let catalog = ResourceCatalog::new(&resources, &[], &[(d(1, 1), d(1, 2))]).unwrap();
        assert_eq!(catalog.dns_for("ann"), vec![(d(1, 1), d(1, 2)), (d(2, 1), d(2, 5))]);
        // Ad-hoc resource outside the catalog still observes global DNS.
        assert_eq!(catalog.dns_for("ghost"), vec![(d(1, 1), d(1, 2))]);
    }
}
