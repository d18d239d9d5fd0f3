//! PTY Virtual Serial Channel
//!
//! The host side of the bridge is a pseudo-terminal. Host programs open the
//! slave device like any serial port; the bridge holds the master. Line
//! settings the host applies to the slave (baud, parity, size, stop bits)
//! are visible through the master's termios and are reported as
//! [`LineEncoding`] changes.

use crate::error::DaemonError;
use line_coding::{LineEncoding, Parity, StopBits};
use std::ffi::CStr;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Non-blocking PTY master
#[derive(Debug)]
pub struct PtyChannel {
    master: File,
    slave_path: PathBuf,
}

impl PtyChannel {
    /// Allocate a PTY in raw mode framed as `initial`
    pub fn open(initial: &LineEncoding) -> Result<Self, DaemonError> {
        // SAFETY: plain libc calls on a descriptor we own; `master` takes
        // ownership immediately so it is closed on every error path below.
        let master = unsafe {
            let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            if fd < 0 {
                return Err(DaemonError::Pty(io::Error::last_os_error()));
            }
            File::from_raw_fd(fd)
        };
        let fd = master.as_raw_fd();

        // SAFETY: fd is a valid PTY master; ptsname_r writes at most buf.len() bytes.
        let slave_path = unsafe {
            if libc::grantpt(fd) != 0 || libc::unlockpt(fd) != 0 {
                return Err(DaemonError::Pty(io::Error::last_os_error()));
            }

            let mut buf = [0 as libc::c_char; 128];
            let rc = libc::ptsname_r(fd, buf.as_mut_ptr(), buf.len());
            if rc != 0 {
                return Err(DaemonError::Pty(io::Error::from_raw_os_error(rc)));
            }
            PathBuf::from(CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned())
        };

        set_nonblocking(fd)?;

        let mut termios = get_termios(fd)?;
        // SAFETY: termios was initialised by tcgetattr.
        unsafe { libc::cfmakeraw(&mut termios) };
        apply_encoding(&mut termios, initial)?;
        set_termios(fd, &termios)?;

        info!("PTY allocated at {} ({})", slave_path.display(), initial);

        Ok(Self { master, slave_path })
    }

    /// Path host programs open
    pub fn slave_path(&self) -> &Path {
        &self.slave_path
    }

    /// Another handle to the same master
    pub fn try_clone(&self) -> Result<Self, DaemonError> {
        Ok(Self {
            master: self.master.try_clone().map_err(DaemonError::Pty)?,
            slave_path: self.slave_path.clone(),
        })
    }

    /// Read one byte if available
    pub fn try_read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.master.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            Ok(_) => None,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            // No slave open
            Err(e) if e.raw_os_error() == Some(libc::EIO) => None,
            Err(e) => {
                debug!("PTY read failed: {}", e);
                None
            }
        }
    }

    /// Write one byte; `Ok(false)` if the PTY cannot take it right now
    pub fn try_write_byte(&mut self, byte: u8) -> io::Result<bool> {
        match self.master.write(&[byte]) {
            Ok(1) => Ok(true),
            Ok(_) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether the master can take more output without blocking
    pub fn is_writable(&self) -> bool {
        let mut pfd = libc::pollfd {
            fd: self.master.as_raw_fd(),
            events: libc::POLLOUT,
            revents: 0,
        };
        // SAFETY: one valid pollfd, zero timeout.
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        rc > 0 && pfd.revents & libc::POLLOUT != 0
    }

    /// Line encoding currently set on the slave
    pub fn line_encoding(&self) -> Result<Option<LineEncoding>, DaemonError> {
        let termios = get_termios(self.master.as_raw_fd())?;
        Ok(termios_to_encoding(&termios))
    }
}

fn set_nonblocking(fd: libc::c_int) -> Result<(), DaemonError> {
    // SAFETY: fcntl on a valid descriptor.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(DaemonError::Pty(io::Error::last_os_error()));
        }
    }
    Ok(())
}

pub(crate) fn get_termios(fd: libc::c_int) -> Result<libc::termios, DaemonError> {
    // SAFETY: termios is plain data; tcgetattr fully initialises it on success.
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut termios) != 0 {
            return Err(DaemonError::Pty(io::Error::last_os_error()));
        }
        Ok(termios)
    }
}

pub(crate) fn set_termios(fd: libc::c_int, termios: &libc::termios) -> Result<(), DaemonError> {
    // SAFETY: tcsetattr reads a fully initialised termios.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) } != 0 {
        return Err(DaemonError::Pty(io::Error::last_os_error()));
    }
    Ok(())
}

const SPEEDS: &[(libc::speed_t, u32)] = &[
    (libc::B300, 300),
    (libc::B600, 600),
    (libc::B1200, 1200),
    (libc::B2400, 2400),
    (libc::B4800, 4800),
    (libc::B9600, 9600),
    (libc::B19200, 19_200),
    (libc::B38400, 38_400),
    (libc::B57600, 57_600),
    (libc::B115200, 115_200),
    (libc::B230400, 230_400),
    (libc::B460800, 460_800),
    (libc::B500000, 500_000),
    (libc::B921600, 921_600),
    (libc::B1000000, 1_000_000),
    (libc::B2000000, 2_000_000),
];

fn speed_to_baud(speed: libc::speed_t) -> Option<u32> {
    SPEEDS.iter().find(|(s, _)| *s == speed).map(|(_, b)| *b)
}

fn baud_to_speed(baud: u32) -> Option<libc::speed_t> {
    SPEEDS.iter().find(|(_, b)| *b == baud).map(|(s, _)| *s)
}

/// Decode termios framing; `None` for B0 (hang-up) or non-standard speeds
pub(crate) fn termios_to_encoding(termios: &libc::termios) -> Option<LineEncoding> {
    // SAFETY: reads a field of an initialised termios.
    let speed = unsafe { libc::cfgetospeed(termios) };
    let baud_rate = speed_to_baud(speed)?;

    let cflag = termios.c_cflag;
    let data_bits = match cflag & libc::CSIZE {
        libc::CS5 => 5,
        libc::CS6 => 6,
        libc::CS7 => 7,
        _ => 8,
    };
    let parity = if cflag & libc::PARENB == 0 {
        Parity::None
    } else if cflag & libc::PARODD != 0 {
        Parity::Odd
    } else {
        Parity::Even
    };
    let stop_bits = if cflag & libc::CSTOPB != 0 {
        StopBits::Two
    } else {
        StopBits::One
    };

    Some(LineEncoding::new(baud_rate, parity, stop_bits, data_bits))
}

/// Write framing into termios
pub(crate) fn apply_encoding(
    termios: &mut libc::termios,
    encoding: &LineEncoding,
) -> Result<(), DaemonError> {
    let speed = baud_to_speed(encoding.baud_rate)
        .ok_or(DaemonError::UnsupportedBaud(encoding.baud_rate))?;

    // SAFETY: termios is initialised and speed is a valid Bxxx constant.
    unsafe {
        libc::cfsetispeed(termios, speed);
        libc::cfsetospeed(termios, speed);
    }

    let mut cflag = termios.c_cflag & !(libc::CSIZE | libc::PARENB | libc::PARODD | libc::CSTOPB);
    cflag |= match encoding.data_bits {
        5 => libc::CS5,
        6 => libc::CS6,
        7 => libc::CS7,
        _ => libc::CS8,
    };
    cflag |= match encoding.parity {
        Parity::None => 0,
        Parity::Odd => libc::PARENB | libc::PARODD,
        Parity::Even => libc::PARENB,
    };
    if encoding.stop_bits == StopBits::Two {
        cflag |= libc::CSTOPB;
    }
    termios.c_cflag = cflag;
    Ok(())
}
