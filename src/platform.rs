//! Thin wrappers over the OS settings stores queried by the theme and wallpaper code.

#[cfg(target_os = "linux")]
pub(crate) mod gsettings {
    use std::io;
    use std::process::Command;

    /// Runs `gsettings get <schema> <key>` and returns the raw value, quotes stripped.
    pub(crate) fn get(schema: &str, key: &str) -> io::Result<String> {
        let output = Command::new("gsettings").args(["get", schema, key]).output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "gsettings get {schema} {key} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(unquote(&String::from_utf8_lossy(&output.stdout)).to_owned())
    }

    pub(crate) fn unquote(value: &str) -> &str {
        let value = value.trim();
        value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .unwrap_or(value)
    }

}

#[cfg(windows)]
pub(crate) mod registry {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::ERROR_SUCCESS;
    use windows::Win32::System::Registry::{
        RegGetValueW, HKEY_CURRENT_USER, RRF_RT_REG_DWORD, RRF_RT_REG_SZ,
    };

    fn wide(text: &str) -> Vec<u16> {
        text.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Reads a `REG_DWORD` below `HKEY_CURRENT_USER`.
    pub(crate) fn read_dword(subkey: &str, value: &str) -> Option<u32> {
        let (subkey, value) = (wide(subkey), wide(value));
        let mut data = 0u32;
        let mut size = std::mem::size_of::<u32>() as u32;
        // SAFETY: the buffers outlive the call and `size` matches `data`.
        let status = unsafe {
            RegGetValueW(
                HKEY_CURRENT_USER,
                PCWSTR(subkey.as_ptr()),
                PCWSTR(value.as_ptr()),
                RRF_RT_REG_DWORD,
                None,
                Some(&mut data as *mut u32 as *mut _),
                Some(&mut size),
            )
        };
        (status == ERROR_SUCCESS).then_some(data)
    }

    /// Reads a `REG_SZ` below `HKEY_CURRENT_USER`. Some values (like the wallpaper
    /// style) are stored as strings holding numbers.
    pub(crate) fn read_string(subkey: &str, value: &str) -> Option<String> {
        let (subkey, value) = (wide(subkey), wide(value));
        let mut buffer = vec![0u16; 512];
        let mut size = (buffer.len() * 2) as u32;
        // SAFETY: `size` is the byte length of `buffer`, which outlives the call.
        let status = unsafe {
            RegGetValueW(
                HKEY_CURRENT_USER,
                PCWSTR(subkey.as_ptr()),
                PCWSTR(value.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                Some(buffer.as_mut_ptr() as *mut _),
                Some(&mut size),
            )
        };
        if status != ERROR_SUCCESS {
            return None;
        }
        let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
        Some(String::from_utf16_lossy(&buffer[..len]))
    }
}
