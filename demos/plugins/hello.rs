//! hello plugin

use std::os::raw::c_char;

fn run() -> Result<(), String> {
    println!("hello from hello");
    Ok(())
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn Run_signature() -> *const c_char {
    c"extern \"C\" fn(*mut u8, usize) -> i32".as_ptr()
}

#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn Run(detail: *mut u8, capacity: usize) -> i32 {
    match run() {
        Ok(()) => 0,
        Err(message) => {
            let len = message.len().min(capacity).min(i32::MAX as usize);
            if len == 0 {
                return -1;
            }
            std::ptr::copy_nonoverlapping(message.as_ptr(), detail, len);
            len as i32
        }
    }
}
