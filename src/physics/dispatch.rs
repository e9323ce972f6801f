//! Work-group sizing for the four kernels.

/// Upper bound on any work-group we ask for, whatever the device allows.
pub const PREFERRED_WORKGROUP_SIZE: u32 = 256;

/// Bytes of work-group storage one pick invocation needs (distance + triangle).
const PICK_SCRATCH_BYTES: u32 = 8;

/// Smallest multiple of `multiple` that is `>= count`.
pub fn ceil_to_multiple(count: u32, multiple: u32) -> u32 {
    count.div_ceil(multiple) * multiple
}

/// One kernel launch: local size and the padded global size covering every element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KernelLaunch {
    pub elements: u32,
    pub workgroup_size: u32,
    pub global_size: u32,
}

impl KernelLaunch {
    pub fn covering(elements: u32, workgroup_size: u32) -> Self {
        Self {
            elements,
            workgroup_size,
            global_size: ceil_to_multiple(elements, workgroup_size),
        }
    }

    pub fn workgroups(&self) -> u32 {
        self.global_size / self.workgroup_size
    }

    /// Work-items past the last element; they must exit without touching memory.
    pub fn padding(&self) -> u32 {
        self.global_size - self.elements
    }
}

/// Local sizes derived from the device's reported limits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkgroupSizes {
    /// Collision and update kernels (one item per body).
    pub object: u32,
    /// Motion kernel (one item per vertex).
    pub vertex: u32,
    /// Pick kernel (one item per triangle); always a power of two.
    pub pick: u32,
}

impl WorkgroupSizes {
    pub fn from_limits(limits: &wgpu::Limits) -> Self {
        let max = PREFERRED_WORKGROUP_SIZE
            .min(limits.max_compute_invocations_per_workgroup)
            .min(limits.max_compute_workgroup_size_x)
            .max(1);

        let storage_bound = (limits.max_compute_workgroup_storage_size / PICK_SCRATCH_BYTES).max(1);
        let pick = floor_power_of_two(max.min(storage_bound));

        Self {
            object: max,
            vertex: max,
            pick,
        }
    }
}

fn floor_power_of_two(value: u32) -> u32 {
    if value == 0 {
        1
    } else {
        1 << (31 - value.leading_zeros())
    }
}

/// Launch geometry for one simulation, fixed at initialization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KernelLaunches {
    pub collision: KernelLaunch,
    pub update: KernelLaunch,
    pub motion: KernelLaunch,
    pub pick: KernelLaunch,
}

impl KernelLaunches {
    pub fn new(sizes: WorkgroupSizes, bodies: u32, vertices: u32, triangles: u32) -> Self {
        Self {
            collision: KernelLaunch::covering(bodies, sizes.object),
            update: KernelLaunch::covering(bodies, sizes.object),
            motion: KernelLaunch::covering(vertices, sizes.vertex),
            pick: KernelLaunch::covering(triangles, sizes.pick),
        }
    }

    /// Largest work-group count of any kernel, checked against the device's per-dimension limit.
    pub fn max_workgroups(&self) -> u32 {
        [self.collision, self.update, self.motion, self.pick]
            .iter()
            .map(KernelLaunch::workgroups)
            .max()
            .unwrap_or(0)
    }
}
