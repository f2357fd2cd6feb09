//! Seccomp BPF filter denying network syscalls
//!
//! A deny-list filter: every syscall is allowed except the socket family,
//! which fails with EPERM. A deny list (rather than an allow list) because
//! a full CPython interpreter needs a broad syscall surface, while the
//! default-deny requirement only covers the network.

use std::io;

/// BPF instruction, identical layout to the kernel's `sock_filter`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BpfInstr {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

/// Seccomp action codes
pub mod actions {
    /// Kill the process
    pub const SECCOMP_RET_KILL: u32 = 0x0000_0000;
    /// Return errno value (low 16 bits)
    pub const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
    /// Allow syscall
    pub const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;
}

/// BPF architecture audit codes
pub mod arch {
    pub const AUDIT_ARCH_X86_64: u32 = 0xc000_003e;
    pub const AUDIT_ARCH_AARCH64: u32 = 0xc000_00b7;
}

const BPF_LD_W_ABS: u16 = 0x20;
const BPF_JEQ_K: u16 = 0x15;
const BPF_RET_K: u16 = 0x06;

/// Offset of the syscall number in `seccomp_data`
const SECCOMP_DATA_NR_OFFSET: u32 = 0;
/// Offset of the architecture in `seccomp_data`
const SECCOMP_DATA_ARCH_OFFSET: u32 = 4;

/// Socket-family syscall numbers for x86_64
#[cfg(target_arch = "x86_64")]
const NETWORK_SYSCALLS: &[u32] = &[
    41,  // socket
    42,  // connect
    43,  // accept
    44,  // sendto
    45,  // recvfrom
    46,  // sendmsg
    47,  // recvmsg
    48,  // shutdown
    49,  // bind
    50,  // listen
    51,  // getsockname
    52,  // getpeername
    53,  // socketpair
    54,  // setsockopt
    55,  // getsockopt
    288, // accept4
    299, // recvmmsg
    307, // sendmmsg
];

/// Socket-family syscall numbers for aarch64
#[cfg(target_arch = "aarch64")]
const NETWORK_SYSCALLS: &[u32] = &[
    198, // socket
    199, // socketpair
    200, // bind
    201, // listen
    202, // accept
    203, // connect
    204, // getsockname
    205, // getpeername
    206, // sendto
    207, // recvfrom
    208, // setsockopt
    209, // getsockopt
    210, // shutdown
    211, // sendmsg
    212, // recvmsg
    242, // accept4
    243, // recvmmsg
    269, // sendmmsg
];

/// Build the network deny filter.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub fn network_deny_filter() -> Option<Vec<BpfInstr>> {
    #[cfg(target_arch = "x86_64")]
    let arch_code = arch::AUDIT_ARCH_X86_64;
    #[cfg(target_arch = "aarch64")]
    let arch_code = arch::AUDIT_ARCH_AARCH64;

    let denied = NETWORK_SYSCALLS;
    let mut instrs = Vec::with_capacity(denied.len() + 6);

    // Validate architecture, kill on mismatch
    instrs.push(BpfInstr {
        code: BPF_LD_W_ABS,
        jt: 0,
        jf: 0,
        k: SECCOMP_DATA_ARCH_OFFSET,
    });
    instrs.push(BpfInstr {
        code: BPF_JEQ_K,
        jt: 1,
        jf: 0,
        k: arch_code,
    });
    instrs.push(BpfInstr {
        code: BPF_RET_K,
        jt: 0,
        jf: 0,
        k: actions::SECCOMP_RET_KILL,
    });

    // Load syscall number and jump to the deny return on any match
    instrs.push(BpfInstr {
        code: BPF_LD_W_ABS,
        jt: 0,
        jf: 0,
        k: SECCOMP_DATA_NR_OFFSET,
    });

    let n = denied.len();
    for (i, nr) in denied.iter().enumerate() {
        instrs.push(BpfInstr {
            code: BPF_JEQ_K,
            jt: (n - i) as u8,
            jf: 0,
            k: *nr,
        });
    }

    instrs.push(BpfInstr {
        code: BPF_RET_K,
        jt: 0,
        jf: 0,
        k: actions::SECCOMP_RET_ALLOW,
    });
    instrs.push(BpfInstr {
        code: BPF_RET_K,
        jt: 0,
        jf: 0,
        k: actions::SECCOMP_RET_ERRNO | (libc::EPERM as u32 & 0xffff),
    });

    Some(instrs)
}

/// No syscall table for this architecture; callers degrade to namespace
/// isolation.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn network_deny_filter() -> Option<Vec<BpfInstr>> {
    None
}

/// Socket filter program header for prctl
#[repr(C)]
struct SockFprog {
    len: u16,
    filter: *const BpfInstr,
}

/// Load a compiled filter into the current process.
///
/// Returns `io::Result` so it can run inside `pre_exec`, between fork and
/// exec in the child.
pub fn load(filter: &[BpfInstr]) -> io::Result<()> {
    let prog = SockFprog {
        len: filter.len() as u16,
        filter: filter.as_ptr(),
    };

    unsafe {
        // Kernel requires NO_NEW_PRIVS before an unprivileged filter load
        if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != 0 {
            return Err(io::Error::last_os_error());
        }

        if libc::prctl(
            libc::PR_SET_SECCOMP,
            libc::SECCOMP_MODE_FILTER,
            &prog as *const SockFprog,
        ) != 0
        {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(test)]
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
mod tests {
    use super::*;

    #[test]
    fn test_filter_compiles() {
        let instrs = network_deny_filter().unwrap();
        assert!(instrs.len() > NETWORK_SYSCALLS.len());
    }

    #[test]
    fn test_filter_ends_with_allow_then_deny() {
        let instrs = network_deny_filter().unwrap();

        let deny = instrs.last().unwrap();
        assert_eq!(deny.code, BPF_RET_K);
        assert_eq!(deny.k & 0xffff_0000, actions::SECCOMP_RET_ERRNO);
        assert_eq!(deny.k & 0xffff, libc::EPERM as u32);

        let allow = &instrs[instrs.len() - 2];
        assert_eq!(allow.k, actions::SECCOMP_RET_ALLOW);
    }

    #[test]
    fn test_jump_offsets_land_on_deny() {
        let instrs = network_deny_filter().unwrap();

        let deny_index = instrs.len() - 1;
        for (i, instr) in instrs.iter().enumerate() {
            if instr.code == BPF_JEQ_K && NETWORK_SYSCALLS.contains(&instr.k) {
                assert_eq!(i + 1 + instr.jt as usize, deny_index, "instr {}", i);
            }
        }
    }

    #[test]
    fn test_actions_values() {
        assert_eq!(actions::SECCOMP_RET_KILL, 0);
        assert_eq!(actions::SECCOMP_RET_ALLOW, 0x7fff_0000);
    }
}
