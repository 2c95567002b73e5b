use chrono::Utc;

fn main() {
    // BUILD_TIME is reported by /api/health / 健康检查中返回构建时间
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);
    println!("cargo:rerun-if-changed=build.rs");
}
