//! Host-side HAL for unit tests.
//!
//! One object plays every HAL role. The CPU keeps a single live register
//! frame; `switch_context` saves it and installs another. Interrupts taken
//! while idle come from a script, and the loader knows a fixed set of
//! program names.

use crate::syscall::Service;
use crate::{Kernel, KernelConfig};
use minikernel_hal::cpu::{FIRST_ARGUMENT_REGISTER, RESULT_REGISTER};
use minikernel_hal::{
    CpuAbstraction, CpuContext, HalError, HalResult, HardwareAbstractionLayer, ImageLoader,
    InterruptLevel, TerminalDevice, Trap, UserMemory, VirtAddr,
};
use spin::Mutex;
use std::collections::VecDeque;

const REGISTERS: usize = 4;
const ENTRY_BASE: u64 = 0x40_0000;
const STACK_BASE: u64 = 0x8000_0000;
const USER_BASE: u64 = 0x1000_0000;

/// Register frame of a mock process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MockContext {
    pub entry: u64,
    pub stack: u64,
    pub regs: [u64; REGISTERS],
}

impl CpuContext for MockContext {
    fn instruction_pointer(&self) -> VirtAddr {
        VirtAddr::new(self.entry)
    }

    fn stack_pointer(&self) -> VirtAddr {
        VirtAddr::new(self.stack)
    }
}

#[derive(Debug)]
pub(crate) struct MockImage {
    entry: u64,
}

#[derive(Debug)]
pub(crate) struct MockStack {
    top: u64,
}

#[derive(Debug, Default)]
struct MockState {
    level: InterruptLevel,
    level_history: Vec<InterruptLevel>,
    user_mode: bool,
    frame: MockContext,
    software_pending: bool,
    idle_script: VecDeque<Trap>,
    switches: Vec<(Option<u64>, u64)>,
    programs: Vec<String>,
    images_created: usize,
    images_released: usize,
    stacks_created: usize,
    stacks_released: usize,
    next_stack: u64,
    regions: Vec<(u64, Vec<u8>)>,
    next_user: u64,
    output: Vec<u8>,
    input: VecDeque<u8>,
    input_levels: Vec<InterruptLevel>,
}

/// Mock hardware
pub(crate) struct MockHal {
    state: Mutex<MockState>,
}

impl MockHal {
    /// Loader knows `init` and `a` to `d`
    pub fn new() -> Self {
        Self::with_programs(&["init", "a", "b", "c", "d"])
    }

    pub fn with_programs(programs: &[&str]) -> Self {
        let state = MockState {
            user_mode: true,
            programs: programs.iter().map(|name| (*name).to_owned()).collect(),
            next_stack: STACK_BASE,
            next_user: USER_BASE,
            ..MockState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Place bytes in user memory and return their address
    pub fn user_bytes(&self, bytes: &[u8]) -> u64 {
        let mut state = self.state.lock();
        let base = state.next_user;
        state.next_user += (bytes.len() as u64 + 0x100) & !0xff;
        state.regions.push((base, bytes.to_vec()));
        base
    }

    /// Place a NUL-terminated string in user memory
    pub fn user_str(&self, text: &str) -> u64 {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.user_bytes(&bytes)
    }

    /// Interrupts delivered, in order, to the next idle waits
    pub fn script_idle(&self, traps: &[Trap]) {
        self.state.lock().idle_script.extend(traps.iter().copied());
    }

    pub fn take_software_interrupt(&self) -> bool {
        core::mem::take(&mut self.state.lock().software_pending)
    }

    pub fn set_user_mode(&self, user: bool) {
        self.state.lock().user_mode = user;
    }

    pub fn set_register(&self, index: usize, value: u64) {
        self.state.lock().frame.regs[index] = value;
    }

    /// Result register of the live frame
    pub fn result_register(&self) -> i64 {
        self.state.lock().frame.regs[RESULT_REGISTER] as i64
    }

    pub fn level(&self) -> InterruptLevel {
        self.state.lock().level
    }

    pub fn level_history(&self) -> Vec<InterruptLevel> {
        self.state.lock().level_history.clone()
    }

    /// Every switch as (entry of the saved frame, entry of the restored frame)
    pub fn switches(&self) -> Vec<(Option<u64>, u64)> {
        self.state.lock().switches.clone()
    }

    pub fn entry_of(&self, program: &str) -> u64 {
        let state = self.state.lock();
        let index = state
            .programs
            .iter()
            .position(|name| name == program)
            .unwrap_or_else(|| panic!("unknown program {program}"));
        ENTRY_BASE + 0x1000 * index as u64
    }

    pub fn live_entry(&self) -> u64 {
        self.state.lock().frame.entry
    }

    pub fn images_created(&self) -> usize {
        self.state.lock().images_created
    }

    pub fn images_released(&self) -> usize {
        self.state.lock().images_released
    }

    pub fn stacks_created(&self) -> usize {
        self.state.lock().stacks_created
    }

    pub fn stacks_released(&self) -> usize {
        self.state.lock().stacks_released
    }

    pub fn terminal_output(&self) -> Vec<u8> {
        self.state.lock().output.clone()
    }

    pub fn push_input(&self, ch: u8) {
        self.state.lock().input.push_back(ch);
    }

    /// Interrupt level at each terminal read
    pub fn input_levels(&self) -> Vec<InterruptLevel> {
        self.state.lock().input_levels.clone()
    }
}

impl HardwareAbstractionLayer for MockHal {
    type Context = MockContext;
    type Image = MockImage;
    type Stack = MockStack;
    type Cpu = Self;
    type Loader = Self;
    type Memory = Self;
    type Terminal = Self;

    fn cpu(&self) -> &Self {
        self
    }

    fn loader(&self) -> &Self {
        self
    }

    fn memory(&self) -> &Self {
        self
    }

    fn terminal(&self) -> &Self {
        self
    }

    fn panic(&self, message: &str) -> ! {
        panic!("kernel panic: {message}")
    }
}

impl CpuAbstraction for MockHal {
    type Context = MockContext;

    fn set_interrupt_level(&self, level: InterruptLevel) -> InterruptLevel {
        let mut state = self.state.lock();
        state.level_history.push(level);
        core::mem::replace(&mut state.level, level)
    }

    fn interrupt_level(&self) -> InterruptLevel {
        self.state.lock().level
    }

    fn halt_until_interrupt(&self) -> Option<Trap> {
        let next = self.state.lock().idle_script.pop_front();
        match next {
            Some(trap) => Some(trap),
            None => panic!("idle wait with no interrupt scripted"),
        }
    }

    fn from_user_mode(&self) -> bool {
        self.state.lock().user_mode
    }

    fn read_register(&self, index: usize) -> u64 {
        self.state.lock().frame.regs[index]
    }

    fn write_register(&self, index: usize, value: u64) {
        self.state.lock().frame.regs[index] = value;
    }

    fn raise_software_interrupt(&self) {
        self.state.lock().software_pending = true;
    }

    unsafe fn switch_context(&self, save: Option<&mut MockContext>, restore: &MockContext) {
        let mut state = self.state.lock();
        let saved = save.map(|slot| {
            *slot = state.frame.clone();
            slot.entry
        });
        state.switches.push((saved, restore.entry));
        state.frame = restore.clone();
    }
}

impl ImageLoader for MockHal {
    type Image = MockImage;
    type Stack = MockStack;
    type Context = MockContext;

    fn create_image(&self, program: &str) -> Option<(MockImage, VirtAddr)> {
        let mut state = self.state.lock();
        let index = state.programs.iter().position(|name| name == program)?;
        state.images_created += 1;
        let entry = ENTRY_BASE + 0x1000 * index as u64;
        Some((MockImage { entry }, VirtAddr::new(entry)))
    }

    fn release_image(&self, _image: MockImage) {
        self.state.lock().images_released += 1;
    }

    fn create_stack(&self, size: usize) -> MockStack {
        let mut state = self.state.lock();
        state.stacks_created += 1;
        let base = state.next_stack;
        state.next_stack += size as u64 + 0x1000;
        MockStack {
            top: base + size as u64,
        }
    }

    fn release_stack(&self, _stack: MockStack) {
        self.state.lock().stacks_released += 1;
    }

    fn initial_context(
        &self,
        image: &MockImage,
        stack: &MockStack,
        _stack_size: usize,
        entry: VirtAddr,
    ) -> MockContext {
        assert_eq!(image.entry, entry.as_u64());
        MockContext {
            entry: entry.as_u64(),
            stack: stack.top,
            regs: [0; REGISTERS],
        }
    }
}

impl UserMemory for MockHal {
    fn copy_from_user(&self, addr: VirtAddr, buf: &mut [u8]) -> HalResult<()> {
        let state = self.state.lock();
        let start = addr.as_u64();
        let end = start
            .checked_add(buf.len() as u64)
            .ok_or(HalError::InvalidAddress)?;
        let (base, bytes) = state
            .regions
            .iter()
            .find(|(base, bytes)| *base <= start && end <= base + bytes.len() as u64)
            .ok_or(HalError::InvalidAddress)?;
        let offset = (start - base) as usize;
        buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
        Ok(())
    }
}

impl TerminalDevice for MockHal {
    fn write(&self, bytes: &[u8]) {
        self.state.lock().output.extend_from_slice(bytes);
    }

    fn read_char(&self) -> u8 {
        let mut state = self.state.lock();
        let level = state.level;
        state.input_levels.push(level);
        state.input.pop_front().unwrap_or(0)
    }
}

/// Create a kernel with the default configuration and start init
pub(crate) fn boot(hal: &MockHal) -> Kernel<'_, MockHal> {
    boot_with(hal, KernelConfig::new())
}

pub(crate) fn boot_with(hal: &MockHal, config: KernelConfig) -> Kernel<'_, MockHal> {
    let mut kernel = Kernel::new(hal, config).expect("valid config");
    kernel.start();
    kernel
}

/// Issue a system call from the running process
///
/// Returns the caller's result if the caller is still running afterwards,
/// `None` if another process took the CPU.
pub(crate) fn syscall(
    kernel: &mut Kernel<'_, MockHal>,
    service: Service,
    args: &[u64],
) -> Option<i64> {
    let hal = kernel.hal();
    hal.set_register(RESULT_REGISTER, service.number());
    for index in 0..REGISTERS - FIRST_ARGUMENT_REGISTER {
        let value = args.get(index).copied().unwrap_or(0);
        hal.set_register(FIRST_ARGUMENT_REGISTER + index, value);
    }
    let caller = kernel.current();
    kernel.handle_trap(Trap::Syscall);
    (kernel.current() == caller).then(|| hal.result_register())
}
