// Licensed under the Apache-2.0 license

mod helpers;

mod test_dependencies;
mod test_image_validation;
mod test_overwrite;
mod test_power_loss;
mod test_rollback;
mod test_swap;
mod test_trailer_api;
