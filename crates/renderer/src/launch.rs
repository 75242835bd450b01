//! Work-group launch sizing.
//!
//! The local tile is fixed once per device as `floor(sqrt(max_work_group_size))`
//! on both axes. Global sizes are recomputed for every target resolution and
//! always round up to a whole number of tiles, so kernels must discard
//! invocations that fall outside `width`/`height`.

/// Square local work-group size shared by every dispatch on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSize {
    pub x: u32,
    pub y: u32,
}

impl LocalSize {
    pub fn square(side: u32) -> Self {
        let side = side.max(1);
        Self { x: side, y: side }
    }

    /// Largest square tile that fits in `max_work_group_size` invocations.
    pub fn from_max_work_group_size(max_work_group_size: u32) -> Self {
        Self::square(integer_sqrt(max_work_group_size))
    }
}

/// Dispatch dimensions for one target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub local: LocalSize,
    pub global: (u32, u32),
    pub width: u32,
    pub height: u32,
}

impl LaunchConfig {
    /// Number of work-groups per axis (`global / local`).
    pub fn workgroups(&self) -> (u32, u32) {
        (self.global.0 / self.local.x, self.global.1 / self.local.y)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Smallest multiple of the local size that covers each requested dimension.
pub fn global_size(width: u32, height: u32, local: LocalSize) -> (u32, u32) {
    (round_up(width, local.x), round_up(height, local.y))
}

fn round_up(value: u32, multiple: u32) -> u32 {
    let multiple = multiple.max(1);
    value.div_ceil(multiple) * multiple
}

fn integer_sqrt(value: u32) -> u32 {
    let mut root = (value as f64).sqrt() as u32;
    // Guard against float rounding on perfect squares near u32::MAX.
    while root.saturating_mul(root) > value {
        root -= 1;
    }
    while (root + 1).saturating_mul(root + 1) <= value {
        root += 1;
    }
    root
}

/// Plans dispatch sizes for a device whose local size was fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct LaunchPlanner {
    local: LocalSize,
}

impl LaunchPlanner {
    pub fn new(max_work_group_size: u32) -> Self {
        let local = LocalSize::from_max_work_group_size(max_work_group_size);
        tracing::debug!(
            max_work_group_size,
            local_x = local.x,
            local_y = local.y,
            "fixed compute tile size"
        );
        Self { local }
    }

    pub fn with_local(local: LocalSize) -> Self {
        Self { local }
    }

    pub fn local(&self) -> LocalSize {
        self.local
    }

    pub fn plan(&self, width: u32, height: u32) -> LaunchConfig {
        LaunchConfig {
            local: self.local,
            global: global_size(width, height, self.local),
            width,
            height,
        }
    }
}
