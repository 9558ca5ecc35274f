//! Host machine facts for the State operation.

use sysinfo::System;

use crate::runtime::Machine;

/// Collects logical cpu count and total memory. Called once at supervisor
/// initialization; the values are treated as constant for the daemon's
/// lifetime.
pub(crate) fn collect() -> Machine {
    let sys = System::new_all();
    Machine {
        cpus: sys.cpus().len() as u32,
        memory: sys.total_memory(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_a_live_host() {
        let machine = collect();
        assert!(machine.cpus > 0);
        assert!(machine.memory > 0);
    }
}
