use crate::components::GroupKind;
use crate::units::PhysicalCategory;

/// Group name under which model-wide quantities are declared.
pub const GLOBAL_GROUP: &str = "FEA";

/// One row of the engine command table. `%N%` is replaced by the group name
/// and `%V%` by the converted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantitySpec {
    pub name: &'static str,
    pub template: &'static str,
    pub category: PhysicalCategory,
}

const fn spec(
    name: &'static str,
    template: &'static str,
    category: PhysicalCategory,
) -> QuantitySpec {
    QuantitySpec {
        name,
        template,
        category,
    }
}

const SURFACE: [QuantitySpec; 1] = [spec("PRESS_i", "SFA,%N%,1,PRES,%V%", PhysicalCategory::Pressure)];

const KEYPOINT: [QuantitySpec; 7] = [
    spec("FX_i", "FK,%N%,FX,%V%", PhysicalCategory::Force),
    spec("FY_i", "FK,%N%,FY,%V%", PhysicalCategory::Force),
    spec("FZ_i", "FK,%N%,FZ,%V%", PhysicalCategory::Force),
    spec("TEMP_i", "DK,%N%,ALL,%V%", PhysicalCategory::Temperature),
    spec("UX_i", "DK,%N%,UX,%V%", PhysicalCategory::Length),
    spec("UY_i", "DK,%N%,UY,%V%", PhysicalCategory::Length),
    spec("UZ_i", "DK,%N%,UZ,%V%", PhysicalCategory::Length),
];

const NODE: [QuantitySpec; 7] = [
    spec("FX_i", "F,%N%,FX,%V%", PhysicalCategory::Force),
    spec("FY_i", "F,%N%,FY,%V%", PhysicalCategory::Force),
    spec("FZ_i", "F,%N%,FZ,%V%", PhysicalCategory::Force),
    spec("TEMP_i", "D,%N%,ALL,%V%", PhysicalCategory::Temperature),
    spec("UX_i", "D,%N%,UX,%V%", PhysicalCategory::Length),
    spec("UY_i", "D,%N%,UY,%V%", PhysicalCategory::Length),
    spec("UZ_i", "D,%N%,UZ,%V%", PhysicalCategory::Length),
];

pub const GLOBAL_QUANTITIES: [QuantitySpec; 3] = [
    spec("omega_Z", "OMEGA,,,%V%", PhysicalCategory::Speed),
    spec("temp_ref", "TREF,%V%", PhysicalCategory::Temperature),
    spec("temp_unif", "TUNIF,%V%", PhysicalCategory::Temperature),
];

pub fn quantities_for(kind: GroupKind) -> &'static [QuantitySpec] {
    match kind {
        GroupKind::Surface => &SURFACE,
        GroupKind::Keypoint => &KEYPOINT,
        GroupKind::Node => &NODE,
    }
}

/// `<group>_<quantity>`, the name a declared value is looked up by.
pub fn value_name(group: &str, quantity: &QuantitySpec) -> String {
    format!("{}_{}", group, quantity.name)
}

impl QuantitySpec {
    pub fn render(&self, group: &str, value: &str) -> String {
        self.template.replace("%N%", group).replace("%V%", value)
    }
}
