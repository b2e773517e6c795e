//! The resource model used by suppliers, traders and the scheduler.

use caravela_proto::CpuClass;

/// A quantity of compute: CPU class, CPU cores and RAM in megabytes.
///
/// This is the arithmetic-capable counterpart of the wire type
/// [`caravela_proto::Resources`]; conversions happen at the API boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resources {
    cpu_class: CpuClass,
    cpus: u32,
    ram: u32,
}

impl Resources {
    /// Creates a new resource quantity.
    #[must_use]
    pub const fn new(cpu_class: CpuClass, cpus: u32, ram: u32) -> Self {
        Self {
            cpu_class,
            cpus,
            ram,
        }
    }

    /// CPU class.
    #[must_use]
    pub const fn cpu_class(&self) -> CpuClass {
        self.cpu_class
    }

    /// CPU cores.
    #[must_use]
    pub const fn cpus(&self) -> u32 {
        self.cpus
    }

    /// RAM in megabytes.
    #[must_use]
    pub const fn ram(&self) -> u32 {
        self.ram
    }

    /// A quantity is usable when it has at least one core and some RAM.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.cpus >= 1 && self.ram >= 1
    }

    /// True when `other` fits inside this quantity.
    ///
    /// The CPU class ranks machines, so a higher-class quantity can satisfy
    /// a lower-class demand but not the other way around.
    #[must_use]
    pub fn contains(&self, other: Self) -> bool {
        self.cpu_class.as_u8() >= other.cpu_class.as_u8()
            && self.cpus >= other.cpus
            && self.ram >= other.ram
    }

    /// Adds `other` in place, keeping the higher CPU class.
    pub fn add(&mut self, other: Self) {
        if other.cpu_class.as_u8() > self.cpu_class.as_u8() {
            self.cpu_class = other.cpu_class;
        }
        self.cpus += other.cpus;
        self.ram += other.ram;
    }

    /// Subtracts `other` in place. Callers check [`contains`](Self::contains)
    /// first; underflow saturates to zero.
    pub fn sub(&mut self, other: Self) {
        self.cpus = self.cpus.saturating_sub(other.cpus);
        self.ram = self.ram.saturating_sub(other.ram);
    }

    /// Empties the quantity.
    pub fn set_zero(&mut self) {
        self.cpus = 0;
        self.ram = 0;
    }
}

impl std::fmt::Display for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{};{};{}>", self.cpu_class, self.cpus, self.ram)
    }
}

impl From<caravela_proto::Resources> for Resources {
    fn from(wire: caravela_proto::Resources) -> Self {
        Self {
            cpu_class: wire.cpu_class,
            cpus: wire.cpus,
            ram: wire.ram,
        }
    }
}

impl From<Resources> for caravela_proto::Resources {
    fn from(res: Resources) -> Self {
        Self {
            cpu_class: res.cpu_class(),
            cpus: res.cpus(),
            ram: res.ram(),
        }
    }
}
