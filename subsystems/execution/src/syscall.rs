//! # System-Call Table
//!
//! ## Calling Convention
//! - Service number: register 0
//! - Arguments: registers 1 to 3
//! - Result: register 0 (negative = error, see [`crate::ExecError::code`])
//!
//! The service number indexes a fixed table. Numbers past the end of the
//! table complete with the "no such service" code and run no handler.

use crate::config::{MUTEX_NAME_LEN, PROGRAM_NAME_LEN};
use crate::kernel::Kernel;
use crate::sync::MutexKind;
use crate::usercopy::{copy_user_chunks, read_user_str};
use crate::{ExecError, ExecResult, MutexId, Outcome};
use minikernel_hal::cpu::{FIRST_ARGUMENT_REGISTER, RESULT_REGISTER};
use minikernel_hal::{CpuAbstraction, HardwareAbstractionLayer, TerminalDevice, VirtAddr};

/// Service numbers
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Create a process from a program name
    CreateProcess = 0,
    /// Terminate the caller
    TerminateProcess = 1,
    /// Write a buffer to the terminal
    Write = 2,
    /// Get the caller's process id
    GetPid = 3,
    /// Sleep for whole seconds
    Sleep = 4,
    /// Create a named mutex
    CreateMutex = 5,
    /// Open a named mutex
    OpenMutex = 6,
    /// Lock a mutex
    LockMutex = 7,
    /// Unlock a mutex
    UnlockMutex = 8,
    /// Close a mutex
    CloseMutex = 9,
}

impl Service {
    /// Number of services in the table
    pub const COUNT: usize = 10;

    /// Convert from number
    pub fn from_number(number: u64) -> Option<Self> {
        match number {
            0 => Some(Self::CreateProcess),
            1 => Some(Self::TerminateProcess),
            2 => Some(Self::Write),
            3 => Some(Self::GetPid),
            4 => Some(Self::Sleep),
            5 => Some(Self::CreateMutex),
            6 => Some(Self::OpenMutex),
            7 => Some(Self::LockMutex),
            8 => Some(Self::UnlockMutex),
            9 => Some(Self::CloseMutex),
            _ => None,
        }
    }

    /// Get the service number
    pub const fn number(self) -> u64 {
        self as u64
    }
}

/// Syscall arguments
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallArgs {
    /// Arg 1
    pub arg1: u64,
    /// Arg 2
    pub arg2: u64,
    /// Arg 3
    pub arg3: u64,
}

impl SyscallArgs {
    /// Read the argument registers
    pub fn from_cpu<C: CpuAbstraction + ?Sized>(cpu: &C) -> Self {
        Self {
            arg1: cpu.read_register(FIRST_ARGUMENT_REGISTER),
            arg2: cpu.read_register(FIRST_ARGUMENT_REGISTER + 1),
            arg3: cpu.read_register(FIRST_ARGUMENT_REGISTER + 2),
        }
    }
}

type Handler<'h, H> = fn(&mut Kernel<'h, H>, &SyscallArgs) -> ExecResult<Outcome>;

/// Syscall table entry
struct ServiceEntry<'h, H: HardwareAbstractionLayer> {
    service: Service,
    name: &'static str,
    arg_count: u8,
    handler: Handler<'h, H>,
}

impl<'h, H: HardwareAbstractionLayer> Kernel<'h, H> {
    const SERVICES: [ServiceEntry<'h, H>; Service::COUNT] = [
        ServiceEntry {
            service: Service::CreateProcess,
            name: "create_process",
            arg_count: 1,
            handler: Self::sys_create_process,
        },
        ServiceEntry {
            service: Service::TerminateProcess,
            name: "terminate_process",
            arg_count: 0,
            handler: Self::sys_terminate_process,
        },
        ServiceEntry {
            service: Service::Write,
            name: "write",
            arg_count: 2,
            handler: Self::sys_write,
        },
        ServiceEntry {
            service: Service::GetPid,
            name: "get_pid",
            arg_count: 0,
            handler: Self::sys_get_pid,
        },
        ServiceEntry {
            service: Service::Sleep,
            name: "sleep",
            arg_count: 1,
            handler: Self::sys_sleep,
        },
        ServiceEntry {
            service: Service::CreateMutex,
            name: "create_mutex",
            arg_count: 2,
            handler: Self::sys_create_mutex,
        },
        ServiceEntry {
            service: Service::OpenMutex,
            name: "open_mutex",
            arg_count: 1,
            handler: Self::sys_open_mutex,
        },
        ServiceEntry {
            service: Service::LockMutex,
            name: "lock_mutex",
            arg_count: 1,
            handler: Self::sys_lock_mutex,
        },
        ServiceEntry {
            service: Service::UnlockMutex,
            name: "unlock_mutex",
            arg_count: 1,
            handler: Self::sys_unlock_mutex,
        },
        ServiceEntry {
            service: Service::CloseMutex,
            name: "close_mutex",
            arg_count: 1,
            handler: Self::sys_close_mutex,
        },
    ];

    /// Run the service requested in the caller's registers
    pub(crate) fn dispatch_syscall(&mut self) -> Outcome {
        let hal = self.hal;
        let cpu = hal.cpu();
        let number = cpu.read_register(RESULT_REGISTER);
        let Some(service) = Service::from_number(number) else {
            log::debug!("pid {:?}: no such service {}", self.current, number);
            return Outcome::Complete(ExecError::NoSuchService.code());
        };
        let args = SyscallArgs::from_cpu(cpu);
        let table = Self::SERVICES;
        let entry = &table[service as usize];
        debug_assert_eq!(entry.service, service);
        log::trace!(
            "pid {:?}: {}/{} {:x?}",
            self.current,
            entry.name,
            entry.arg_count,
            [args.arg1, args.arg2, args.arg3]
        );
        Outcome::settle((entry.handler)(self, &args))
    }

    fn sys_create_process(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        let hal = self.hal;
        let program = read_user_str::<_, PROGRAM_NAME_LEN>(hal.memory(), VirtAddr::new(args.arg1))?;
        let id = self.create_process(&program)?;
        Ok(Outcome::Complete(id.as_u64() as i64))
    }

    fn sys_terminate_process(&mut self, _args: &SyscallArgs) -> ExecResult<Outcome> {
        self.terminate_current()
    }

    fn sys_write(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        let hal = self.hal;
        let terminal = hal.terminal();
        copy_user_chunks(hal.memory(), VirtAddr::new(args.arg1), args.arg2, |chunk| {
            terminal.write(chunk)
        })?;
        Ok(Outcome::Complete(0))
    }

    fn sys_get_pid(&mut self, _args: &SyscallArgs) -> ExecResult<Outcome> {
        let id = self.caller()?;
        Ok(Outcome::Complete(id.as_u64() as i64))
    }

    fn sys_sleep(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        let seconds = u32::try_from(args.arg1).map_err(|_| ExecError::InvalidArgument)?;
        self.sleep(seconds)
    }

    fn sys_create_mutex(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        let hal = self.hal;
        let name = read_user_str::<_, MUTEX_NAME_LEN>(hal.memory(), VirtAddr::new(args.arg1))?;
        let kind = MutexKind::from_raw(args.arg2)?;
        self.create_mutex(&name, kind)
    }

    fn sys_open_mutex(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        let hal = self.hal;
        let name = read_user_str::<_, MUTEX_NAME_LEN>(hal.memory(), VirtAddr::new(args.arg1))?;
        let id = self.open_mutex(&name)?;
        Ok(Outcome::Complete(id.as_u64() as i64))
    }

    fn sys_lock_mutex(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        self.lock_mutex(MutexId::new(args.arg1))
    }

    fn sys_unlock_mutex(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        self.unlock_mutex(MutexId::new(args.arg1))?;
        Ok(Outcome::Complete(0))
    }

    fn sys_close_mutex(&mut self, args: &SyscallArgs) -> ExecResult<Outcome> {
        self.close_mutex(MutexId::new(args.arg1))?;
        Ok(Outcome::Complete(0))
    }
}
