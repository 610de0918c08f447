/*++

Licensed under the Apache-2.0 license.

File Name:

    api.rs

Abstract:

    File contains the trailer operations offered to the running image:
    request an upgrade, confirm the running image and query the swap state.

--*/

use swapboot_drivers::{cprintln, Flash};
use swapboot_error::{BootError, BootResult};

use crate::config::BootConfig;
use crate::swap::SwapState;
use crate::trailer::{FlagState, MagicState, SwapType};

/// Request an upgrade to the image in the secondary slot on the next boot
///
/// # Arguments
///
/// * `flash` - Flash holding the slots
/// * `config` - Boot configuration
/// * `image` - Logical image
/// * `permanent` - Keep the new image without a confirmation
///
/// A damaged secondary trailer is erased and reported with
/// `BOOT_REQUEST_CORRUPT`; calling again then records the request.
pub fn set_pending<F: Flash>(
    flash: &mut F,
    config: &BootConfig,
    image: usize,
    permanent: bool,
) -> BootResult<()> {
    let layout = config.validate(&*flash)?;
    let image = layout.image(image)?;
    let sec = image.secondary_trailer();

    match sec.read_magic(&*flash)? {
        // Already requested
        MagicState::Good => return Ok(()),
        MagicState::Bad => {
            sec.erase(flash)?;
            cprintln!("[api] Image {} damaged request erased", image.index);
            Err(BootError::BOOT_REQUEST_CORRUPT)?;
        }
        MagicState::Unset => sec.erase_if_dirty(flash)?,
    }

    let swap_type = if permanent {
        sec.write_image_ok(flash)?;
        SwapType::Perm
    } else {
        SwapType::Test
    };
    sec.write_swap_info(flash, image.index, swap_type)?;
    sec.write_magic(flash)?;

    cprintln!("[api] Image {} {} pending", image.index, swap_type);
    Ok(())
}

/// Mark the running image as good so it is not reverted
///
/// # Arguments
///
/// * `flash` - Flash holding the slots
/// * `config` - Boot configuration
/// * `image` - Logical image
pub fn set_confirmed<F: Flash>(flash: &mut F, config: &BootConfig, image: usize) -> BootResult<()> {
    let layout = config.validate(&*flash)?;
    let image = layout.image(image)?;
    let pri = image.primary_trailer();
    let state = pri.read_state(&*flash)?;

    match state.magic {
        // No swap on record, nothing can revert
        MagicState::Unset => Ok(()),
        MagicState::Bad => Err(BootError::SWAP_TRAILER_BAD_MAGIC),
        MagicState::Good => match state.image_ok {
            FlagState::Set => Ok(()),
            FlagState::Bad => Err(BootError::SWAP_TRAILER_FLAG_CORRUPT),
            FlagState::Unset => {
                pri.write_image_ok(flash)?;
                cprintln!("[api] Image {} confirmed", image.index);
                Ok(())
            }
        },
    }
}

/// Swap state of `image` as recorded in its trailers
pub fn swap_state<F: Flash>(flash: &F, config: &BootConfig, image: usize) -> BootResult<SwapState> {
    let layout = config.validate(flash)?;
    crate::swap::swap_state(flash, layout.image(image)?, layout.mode)
}
