//! Scoped ownership of the array returned by `GetMagickInfoList`.

use super::{MagickApi, MagickInfo, NativeException, RawDescriptor};
use crate::error::MagickError;
use std::ffi::{CStr, c_void};
use std::ptr::NonNull;

/// Owns a native format array and relinquishes it exactly once on drop.
///
/// Ownership is taken before the exception is inspected, so the array is
/// released on every path: success, a native error reported alongside a
/// non-null array, and any early return while copying entries out.
pub struct FormatInfoList<'a, A: MagickApi + ?Sized> {
    api: &'a A,
    array: Option<NonNull<*const MagickInfo>>,
    len: usize,
}

impl<'a, A: MagickApi + ?Sized> FormatInfoList<'a, A> {
    /// Query the registry for every format matching `pattern`.
    pub fn acquire(api: &'a A, pattern: &CStr) -> Result<Self, MagickError> {
        let mut count = 0usize;
        let mut exception = NativeException::default();
        // SAFETY: the returned array is owned by the guard built on the next line.
        let raw = unsafe { api.format_info_list(pattern, &mut count, &mut exception) };
        let array = NonNull::new(raw);
        let list = Self {
            api,
            array,
            len: if array.is_some() { count } else { 0 },
        };

        exception.check()?;

        if array.is_none() && count > 0 {
            log::warn!("GetMagickInfoList reported {count} formats but returned no array");
        }
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries in native list order, paired with their index. Null slots are
    /// skipped.
    pub fn descriptors(&self) -> impl Iterator<Item = (usize, RawDescriptor<'_>)> + '_ {
        (0..self.len).filter_map(move |index| {
            let array = self.array?;
            // SAFETY: `index < len` and the array is live until `self` drops.
            let entry = unsafe { *array.as_ptr().add(index) };
            if entry.is_null() {
                return None;
            }
            // SAFETY: `entry` belongs to our live array; the borrow is tied to `self`.
            Some((index, unsafe { self.api.read_descriptor(entry) }))
        })
    }
}

impl<A: MagickApi + ?Sized> Drop for FormatInfoList<'_, A> {
    fn drop(&mut self) {
        if let Some(array) = self.array.take() {
            // SAFETY: the array came from `format_info_list` and is released only here.
            unsafe { self.api.relinquish(array.as_ptr() as *mut c_void) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::tests::{MockEntry, MockMagick};

    const ALL: &CStr = c"*";

    #[test]
    fn releases_once_on_success() {
        let mock = MockMagick::with_entries(vec![
            MockEntry::new("PNG", "Portable Network Graphics"),
            MockEntry::new("GIF", "CompuServe graphics interchange format"),
        ]);

        {
            let list = FormatInfoList::acquire(&mock, ALL).unwrap();
            assert_eq!(list.len(), 2);
            let names: Vec<&[u8]> = list.descriptors().map(|(_, d)| d.name).collect();
            assert_eq!(names, vec![&b"PNG"[..], &b"GIF"[..]]);
            assert_eq!(mock.lists_released(), 0);
        }

        assert_eq!(mock.lists_acquired(), 1);
        assert_eq!(mock.lists_released(), 1);
        assert_eq!(mock.bad_releases(), 0);
    }

    #[test]
    fn releases_once_when_error_comes_with_array() {
        let mut mock = MockMagick::failing(400, "memory allocation failed");
        mock.entries = vec![MockEntry::new("PNG", "Portable Network Graphics")];
        mock.array_despite_exception = true;

        let err = FormatInfoList::acquire(&mock, ALL).err().unwrap();

        assert_eq!(err.native_code(), Some(400));
        assert_eq!(mock.lists_acquired(), 1);
        assert_eq!(mock.lists_released(), 1);
        assert_eq!(mock.lists_leaked(), 0);
    }

    #[test]
    fn null_array_with_error_releases_nothing() {
        let mock = MockMagick::failing(445, "cache resources exhausted");

        let err = FormatInfoList::acquire(&mock, ALL).err().unwrap();

        assert_eq!(err.native_code(), Some(445));
        assert_eq!(mock.lists_acquired(), 0);
        assert_eq!(mock.bad_releases(), 0);
    }

    #[test]
    fn null_array_without_error_is_empty() {
        let mut mock = MockMagick::failing(0, "");
        mock.null_count = Some(3);

        let list = FormatInfoList::acquire(&mock, ALL).unwrap();

        assert!(list.is_empty());
        assert_eq!(list.descriptors().count(), 0);
    }

    #[test]
    fn warning_does_not_fail() {
        let mut mock = MockMagick::failing(355, "module not found");
        mock.entries = vec![MockEntry::new("PNG", "Portable Network Graphics")];
        mock.array_despite_exception = true;

        {
            let list = FormatInfoList::acquire(&mock, ALL).unwrap();
            assert_eq!(list.len(), 1);
        }
        assert_eq!(mock.lists_released(), 1);
    }
}
