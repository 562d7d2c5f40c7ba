//! Name-keyed slot collections shared by several services
//!
//! A balancer's frontend configs, rules and probes belong to many services
//! at once. A service
//! only ever touches the slots its prefix owns; everything else is carried
//! through untouched and in order.

use crate::model::{
    FrontendIpConfiguration, IpAllocationMethod, LoadBalancingRule, Probe, SubResource,
};

pub trait Slot {
    fn slot_name(&self) -> &str;

    /// Equal apart from the name's case and provider-assigned values
    fn same_settings(&self, other: &Self) -> bool;
}

/// Converge the owned part of `slots` onto `expected`.
///
/// Owned slots that are not expected are dropped, expected slots are
/// inserted or updated in place. Returns whether anything changed.
pub fn converge<T: Slot>(
    slots: &mut Vec<T>,
    owned: impl Fn(&str) -> bool,
    expected: Vec<T>,
) -> bool {
    let before = slots.len();
    slots.retain(|slot| {
        !owned(slot.slot_name())
            || expected
                .iter()
                .any(|want| want.slot_name().eq_ignore_ascii_case(slot.slot_name()))
    });
    let mut dirty = slots.len() != before;

    for want in expected {
        match slots
            .iter_mut()
            .find(|slot| slot.slot_name().eq_ignore_ascii_case(want.slot_name()))
        {
            Some(existing) if existing.same_settings(&want) => {}
            Some(existing) => {
                *existing = want;
                dirty = true;
            }
            None => {
                slots.push(want);
                dirty = true;
            }
        }
    }

    dirty
}

impl Slot for LoadBalancingRule {
    fn slot_name(&self) -> &str {
        &self.name
    }

    fn same_settings(&self, other: &Self) -> bool {
        self.protocol == other.protocol
            && self.frontend_port == other.frontend_port
            && self.backend_port == other.backend_port
            && self
                .frontend_ip_configuration
                .id
                .eq_ignore_ascii_case(&other.frontend_ip_configuration.id)
            && self
                .backend_address_pool
                .id
                .eq_ignore_ascii_case(&other.backend_address_pool.id)
            && same_reference(&self.probe, &other.probe)
            && self.load_distribution == other.load_distribution
            && self.enable_floating_ip == other.enable_floating_ip
    }
}

impl Slot for FrontendIpConfiguration {
    fn slot_name(&self) -> &str {
        &self.name
    }

    fn same_settings(&self, other: &Self) -> bool {
        same_reference(&self.public_ip_address, &other.public_ip_address)
            && same_reference(&self.subnet, &other.subnet)
            && self.private_ip_allocation_method == other.private_ip_allocation_method
            && match self.private_ip_allocation_method {
                Some(IpAllocationMethod::Dynamic) => true,
                _ => self.private_ip_address == other.private_ip_address,
            }
    }
}

impl Slot for Probe {
    fn slot_name(&self) -> &str {
        &self.name
    }

    fn same_settings(&self, other: &Self) -> bool {
        self.protocol == other.protocol
            && self.port == other.port
            && self.request_path == other.request_path
            && self.interval_in_seconds == other.interval_in_seconds
            && self.number_of_probes == other.number_of_probes
    }
}

fn same_reference(a: &Option<SubResource>, b: &Option<SubResource>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id.eq_ignore_ascii_case(&b.id),
        (None, None) => true,
        _ => false,
    }
}
