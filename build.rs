fn main() {
    // GDAL comes from the system on Unix; on Windows it is located through vcpkg.
    let target = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target == "windows" {
        vcpkg::Config::new()
            .find_package("gdal")
            .expect("GDAL not found in vcpkg");
    }
}
