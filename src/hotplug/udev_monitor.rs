use std::os::fd::AsRawFd;

/// Watches udev for DRM connector changes
///
/// Runs in a dedicated blocking thread because udev's MonitorSocket is not Send.
/// It uses libc::poll() to wait for events on the udev socket.
pub struct UdevMonitor {
    socket: udev::MonitorSocket,
}

impl UdevMonitor {
    /// Monitor the `drm` subsystem, where connector plug and unplug show up
    /// as `change` events on the card device
    pub fn new() -> Result<Self, std::io::Error> {
        let socket = udev::MonitorBuilder::new()?
            .match_subsystem("drm")?
            .listen()?;

        Ok(Self { socket })
    }

    /// Block, calling `callback` for every add/remove/change event
    ///
    /// Returns when `callback` answers `false` or polling fails.
    pub fn run<F>(self, mut callback: F) -> std::io::Error
    where
        F: FnMut(&udev::Event) -> bool,
    {
        info!("Display hotplug monitoring started");

        let fd = self.socket.as_raw_fd();

        loop {
            let mut poll_fd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };

            // Negative timeout waits forever
            let poll_result = unsafe { libc::poll(&mut poll_fd, 1, -1) };

            if poll_result < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                error!("Poll error: {}", err);
                return err;
            }

            for event in self.socket.iter() {
                match event.event_type() {
                    udev::EventType::Add | udev::EventType::Remove | udev::EventType::Change => {
                        debug!(
                            "udev event: type={:?}, syspath={:?}",
                            event.event_type(),
                            event.syspath()
                        );

                        if !callback(&event) {
                            return std::io::Error::new(
                                std::io::ErrorKind::Interrupted,
                                "Stopped by callback",
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
