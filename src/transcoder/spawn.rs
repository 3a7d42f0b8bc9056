use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use nix::fcntl::{fcntl, FcntlArg};
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
use nix::fcntl::FdFlag;
use nix::unistd::dup2;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};

/// Upper bound on extra channels a transcoder can be given.
const MAX_CHANNELS: usize = 8;
/// Child side descriptors are first moved at or above this number, so that
/// mapping one onto its target can never clobber another that is still pending.
const LIFT_BASE: RawFd = 64;

/// A transcoder invocation plus the extra pipe channels it expects.
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Descriptor the child writes its progress text to.
    pub progress_fd: Option<RawFd>,
    /// Descriptors the child reads media bytes from, in channel order.
    pub input_fds: Vec<RawFd>,
}

impl TranscodeCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            progress_fd: None,
            input_fds: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn progress_channel(mut self, fd: RawFd) -> Self {
        self.progress_fd = Some(fd);
        self
    }

    pub fn input_channel(mut self, fd: RawFd) -> Self {
        self.input_fds.push(fd);
        self
    }
}

/// `(child side of a pipe in the parent, descriptor number in the child)`.
#[derive(Clone, Copy)]
struct FdPlan {
    len: usize,
    pairs: [(RawFd, RawFd); MAX_CHANNELS],
}

impl FdPlan {
    fn new(mappings: &[(OwnedFd, RawFd)]) -> io::Result<Self> {
        if mappings.len() > MAX_CHANNELS {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "too many transcoder channels"));
        }

        let mut plan = FdPlan { len: mappings.len(), pairs: [(-1, -1); MAX_CHANNELS] };
        for (i, (fd, target)) in mappings.iter().enumerate() {
            if *target < 3 || *target >= LIFT_BASE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("channel descriptor {} out of range 3..{}", target, LIFT_BASE),
                ));
            }
            if plan.pairs[..i].iter().any(|(_, t)| t == target) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("channel descriptor {} mapped twice", target),
                ));
            }
            plan.pairs[i] = (fd.as_raw_fd(), *target);
        }
        Ok(plan)
    }

    // Runs between fork and exec: fixed-size arrays and raw syscalls only.
    fn apply(&self) -> io::Result<()> {
        let mut lifted = [-1; MAX_CHANNELS];
        for i in 0..self.len {
            lifted[i] = fcntl(self.pairs[i].0, FcntlArg::F_DUPFD_CLOEXEC(LIFT_BASE))?;
        }
        // dup2 clears FD_CLOEXEC on the target; the lifted copies still close on exec
        for i in 0..self.len {
            dup2(lifted[i], self.pairs[i].1)?;
        }
        Ok(())
    }
}

// close-on-exec from creation: a fork on another thread must not inherit these
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    Ok(nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)?)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}

/// A running transcoder and the parent ends of its channels.
///
/// Dropping it closes every pipe and kills the child if it is still running.
pub struct Transcoder {
    child: Child,
    progress: Option<pipe::Receiver>,
    inputs: Vec<Option<pipe::Sender>>,
}

impl Transcoder {
    pub fn spawn(command: &TranscodeCommand) -> io::Result<Self> {
        let mut child_ends: Vec<(OwnedFd, RawFd)> = Vec::new();

        let progress = match command.progress_fd {
            Some(target) => {
                let (read, write) = cloexec_pipe()?;
                child_ends.push((write, target));
                Some(pipe::Receiver::from_file(File::from(read))?)
            }
            None => None,
        };

        let mut inputs = Vec::with_capacity(command.input_fds.len());
        for target in &command.input_fds {
            let (read, write) = cloexec_pipe()?;
            child_ends.push((read, *target));
            inputs.push(Some(pipe::Sender::from_file(File::from(write))?));
        }

        let plan = FdPlan::new(&child_ends)?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        // SAFETY: `apply` only calls fcntl/dup2 on descriptors that stay open in
        // the parent until `spawn` returns, and does not allocate.
        unsafe {
            cmd.pre_exec(move || plan.apply());
        }

        log::debug!("Spawning transcoder {:?} {:?}", command.program, command.args);
        let child = cmd.spawn().map_err(|e| {
            io::Error::new(e.kind(), format!("failed to start {:?}: {}", command.program, e))
        })?;

        // the child holds its own copies now; ours must go or readers never see EOF
        drop(child_ends);

        Ok(Self { child, progress, inputs })
    }

    pub fn take_progress(&mut self) -> Option<pipe::Receiver> {
        self.progress.take()
    }

    pub fn take_input(&mut self, channel: usize) -> Option<pipe::Sender> {
        self.inputs.get_mut(channel).and_then(Option::take)
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kills the child (if still running) and reaps it.
    pub async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            log::debug!("Transcoder already gone: {}", e);
        }
        if let Err(e) = self.child.wait().await {
            log::warn!("Failed to reap transcoder: {}", e);
        }
    }
}
