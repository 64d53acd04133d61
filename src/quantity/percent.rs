quantity!(Percent, "%", 0);
